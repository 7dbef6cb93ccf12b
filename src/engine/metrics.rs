//! Matcher run metrics.
//!
//! This module defines a small set of structs used to observe and debug what
//! the matcher did.
//!
//! The intended usage is:
//!
//! - `Matcher::transliterate` / `Transliterator::transliterate_str` for normal
//!   operation.
//! - `Matcher::transliterate_with_metrics` /
//!   `Transliterator::transliterate_str_with_metrics` for profiling, debugging
//!   rule sets, and inspecting which rules fired.
//!
//! Metrics are *opt-in*: the plain entry points pass no recorder and skip the
//! bookkeeping entirely.

use super::rule_set::RuleId;
use std::time::Duration;

/// What a single matcher call did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassMetrics {
    /// Elapsed time for the call.
    pub duration: Duration,
    /// Loop iterations (one per resolved scan position).
    pub steps: usize,
    /// Number of rule replacements.
    pub replacements: usize,
    /// Characters committed unchanged because no rule applied.
    pub copied: usize,
    /// Rules that fired, in firing order.
    pub fired: Vec<RuleId>,
    /// The call stopped on a partial match.
    pub halted: bool,
    /// The call ran out of steps and committed the rest of the text as is.
    pub budget_exhausted: bool,
}

impl PassMetrics {
    /// Fold another pass into this one (used to total a keyboard session).
    pub fn absorb(&mut self, other: PassMetrics) {
        self.duration += other.duration;
        self.steps += other.steps;
        self.replacements += other.replacements;
        self.copied += other.copied;
        self.fired.extend(other.fired);
        self.halted = other.halted;
        self.budget_exhausted |= other.budget_exhausted;
    }
}

#[derive(Debug, Default, Clone)]
pub struct RunMetrics {
    /// Total elapsed time, including buffer conversion.
    pub total: Duration,
    /// Matcher work, summed over every pass of the run.
    pub pass: PassMetrics,
    /// Number of matcher calls.
    pub passes: usize,
}

/// Output text bundled with metrics.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub output: String,
    pub metrics: RunMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_sums_counts_and_keeps_last_halt() {
        let mut total = PassMetrics { steps: 2, copied: 1, fired: vec![0], halted: true, ..Default::default() };
        total.absorb(PassMetrics { steps: 3, replacements: 2, fired: vec![1, 0], ..Default::default() });
        assert_eq!(total.steps, 5);
        assert_eq!(total.replacements, 2);
        assert_eq!(total.copied, 1);
        assert_eq!(total.fired, vec![0, 1, 0]);
        assert!(!total.halted);
    }
}
