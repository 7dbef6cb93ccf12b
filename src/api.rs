use crate::engine::{DEFAULT_STEP_BUDGET_FACTOR, Matcher, PassMetrics, RuleSet, RunMetrics, RunResult};
use crate::{NotationError, Position, Replaceable, Rule, RuleError};
use std::time::Instant;
use tracing::debug;

/// Options that affect matching behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Steps in a row without progress (at least `rules + 1`) before a matcher
    /// call commits the rest of its text unchanged. Its square bounds how far
    /// a call may grow the text per symbol it was handed.
    pub step_budget_factor: u32,
}

impl Default for Options {
    fn default() -> Self {
        Options { step_budget_factor: DEFAULT_STEP_BUDGET_FACTOR }
    }
}

/// A frozen rule set with an identifier, ready to rewrite text.
///
/// Usage: build once with [`Transliterator::new`] (or `from_rules` /
/// `from_notation`), then call [`transliterate_str`](Self::transliterate_str)
/// for one-shot work, or
/// [`transliterate_incremental`](Self::transliterate_incremental) per typed
/// chunk followed by [`finish_transliteration`](Self::finish_transliteration)
/// for keyboard-style input.
///
/// ```text
/// keystroke ──▶ insert at limit ──▶ incremental pass ──▶ halted? wait : commit
///                                                       ...
/// end of input ──▶ finish_transliteration (pending matches resolved)
/// ```
///
/// A `Transliterator` is immutable and can be shared across threads; each
/// session owns its own buffer and [`Position`].
#[derive(Debug, Clone)]
pub struct Transliterator {
    id: String,
    rules: RuleSet,
    options: Options,
}

impl Transliterator {
    /// Wrap `rules`, freezing them if needed.
    pub fn new(id: impl Into<String>, mut rules: RuleSet) -> Result<Self, RuleError> {
        if !rules.is_frozen() {
            rules.freeze()?;
        }
        Ok(Transliterator { id: id.into(), rules, options: Options::default() })
    }

    pub fn from_rules(id: impl Into<String>, rules: impl IntoIterator<Item = Rule>) -> Result<Self, RuleError> {
        Self::new(id, RuleSet::from_rules(rules)?)
    }

    /// Build from rule notation (see [`parse_rules`](crate::parse_rules)).
    ///
    /// # Example
    /// ```
    /// use translit::Transliterator;
    ///
    /// let t = Transliterator::from_notation("demo", "ab > x|yzacw ; za > q ; qc > r ; cw > n").unwrap();
    /// assert_eq!(t.transliterate_str("ab"), "xyqn");
    /// ```
    pub fn from_notation(id: impl Into<String>, source: &str) -> Result<Self, NotationError> {
        let rules = crate::parse_rules(source)?;
        Ok(Self::from_rules(id, rules)?)
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Committed characters a caller must keep before `start` for ante
    /// context to keep working.
    pub fn max_context_length(&self) -> usize {
        self.rules.max_context_length()
    }

    fn matcher(&self) -> Matcher<'_> {
        // `rules` is frozen at construction and never handed out mutably.
        match Matcher::new(&self.rules) {
            Ok(m) => m.with_step_budget_factor(self.options.step_budget_factor),
            Err(_) => unreachable!("transliterator holds an unfrozen rule set"),
        }
    }

    /// Rewrite `text` in one shot.
    pub fn transliterate_str(&self, text: &str) -> String {
        let mut buf: Vec<char> = text.chars().collect();
        self.transliterate(&mut buf);
        buf.into_iter().collect()
    }

    /// Rewrite `text` in one shot, recording metrics.
    pub fn transliterate_str_with_metrics(&self, text: &str) -> RunResult {
        let t0 = Instant::now();
        let mut buf: Vec<char> = text.chars().collect();
        let mut pos = Position::new(0, buf.len());
        let (_, pass) = self.matcher().transliterate_with_metrics(&mut buf, &mut pos, false);
        let output = buf.into_iter().collect();
        RunResult { output, metrics: RunMetrics { total: t0.elapsed(), pass, passes: 1 } }
    }

    /// Rewrite a whole buffer in one shot.
    pub fn transliterate<R: Replaceable + ?Sized>(&self, text: &mut R) {
        let len = text.len();
        self.transliterate_range(text, 0, len);
    }

    /// Rewrite `[start, limit)` in one shot and return the new limit. Text
    /// outside the range is neither rewritten nor used as context.
    pub fn transliterate_range<R: Replaceable + ?Sized>(&self, text: &mut R, start: usize, limit: usize) -> usize {
        let limit = limit.min(text.len());
        let mut pos = Position::new(start.min(limit), limit);
        self.matcher().transliterate(text, &mut pos, false);
        pos.limit
    }

    /// Keyboard-style step: append `insertion` at `pos.limit`, then rewrite
    /// as far as possible without guessing about text that has not arrived.
    ///
    /// Returns `false` if a partial match is waiting for more input. The
    /// context start is never moved, so anchors and ante context see the
    /// same text they would in a one-shot pass.
    pub fn transliterate_incremental<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
        insertion: Option<&str>,
    ) -> bool {
        self.incremental_pass(text, pos, insertion).0
    }

    /// [`transliterate_incremental`](Self::transliterate_incremental) with
    /// metrics for the pass.
    pub fn transliterate_incremental_with_metrics<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
        insertion: Option<&str>,
    ) -> (bool, PassMetrics) {
        self.incremental_pass(text, pos, insertion)
    }

    fn incremental_pass<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
        insertion: Option<&str>,
    ) -> (bool, PassMetrics) {
        if !pos.is_valid(text.len()) {
            debug!(?pos, len = text.len(), "clamping position into buffer");
            pos.clamp_to(text.len());
        }
        if let Some(insertion) = insertion {
            let chars: Vec<char> = insertion.chars().collect();
            text.replace(pos.limit, pos.limit, &chars);
            pos.limit += chars.len();
        }
        self.matcher().transliterate_with_metrics(text, pos, true)
    }

    /// Resolve any pending partial match: no more input will arrive, so
    /// whatever matches with the text on hand applies.
    pub fn finish_transliteration<R: Replaceable + ?Sized>(&self, text: &mut R, pos: &mut Position) {
        if !pos.is_valid(text.len()) {
            pos.clamp_to(text.len());
        }
        self.matcher().finish_transliteration(text, pos);
    }

    /// [`finish_transliteration`](Self::finish_transliteration) with metrics
    /// for the pass.
    pub fn finish_transliteration_with_metrics<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
    ) -> PassMetrics {
        if !pos.is_valid(text.len()) {
            pos.clamp_to(text.len());
        }
        self.matcher().transliterate_with_metrics(text, pos, false).1
    }

    /// Feed `input` one character at a time, then finish; returns the buffer
    /// and the session totals. Mostly useful for checking that a rule set
    /// behaves the same incrementally as in one shot.
    pub fn transliterate_keyed(&self, input: &str) -> RunResult {
        let t0 = Instant::now();
        let mut buf: Vec<char> = Vec::with_capacity(input.len());
        let mut pos = Position::default();
        let mut metrics = RunMetrics::default();
        let mut scratch = [0u8; 4];

        for c in input.chars() {
            let (_, pass) = self.incremental_pass(&mut buf, &mut pos, Some(c.encode_utf8(&mut scratch)));
            metrics.pass.absorb(pass);
            metrics.passes += 1;
        }
        let matcher = self.matcher();
        let (_, pass) = matcher.transliterate_with_metrics(&mut buf, &mut pos, false);
        metrics.pass.absorb(pass);
        metrics.passes += 1;
        metrics.total = t0.elapsed();

        RunResult { output: buf.into_iter().collect(), metrics }
    }
}

// Convenience for callers that only have an engine-level rule set.
impl TryFrom<RuleSet> for Transliterator {
    type Error = RuleError;

    fn try_from(rules: RuleSet) -> Result<Self, Self::Error> {
        Transliterator::new("<anonymous>", rules)
    }
}
