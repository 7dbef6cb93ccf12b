//! Error types for rule construction, rule set compilation and rule notation.
//!
//! All of these are structural/configuration errors: they are reported
//! synchronously to whoever builds or freezes a rule set and are never
//! retried. Matching itself has no error channel.

use thiserror::Error;

/// Why a rule was rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleDefect {
    /// A rule must consume at least one input symbol; an empty key would
    /// produce zero-length matches.
    #[error("key is empty")]
    EmptyKey,

    /// The cursor marker points past the end of the output.
    #[error("cursor offset {cursor} is outside output of length {output_len}")]
    CursorOutOfRange { cursor: usize, output_len: usize },
}

/// Errors raised while building or compiling a rule set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Malformed rule.
    #[error("invalid rule: {0}")]
    InvalidRule(RuleDefect),

    /// Operation not allowed in the rule set's current frozen/unfrozen state.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// A rule can never fire because an earlier rule always matches first.
    #[error("rule {masked} is masked by rule {masking}: {description}")]
    MaskedRule {
        /// Declaration index of the unreachable rule.
        masked: usize,
        /// Declaration index of the rule that shadows it.
        masking: usize,
        description: String,
    },
}

/// Errors raised while reading rule notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {source}")]
    Rule {
        line: usize,
        #[source]
        source: RuleError,
    },

    /// The statements parsed, but the rule set failed to compile.
    #[error(transparent)]
    RuleSet(#[from] RuleError),
}

impl NotationError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        NotationError::Syntax { line, message: message.into() }
    }
}
