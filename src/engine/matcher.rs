//! Scan/match/replace loop.
//!
//! This module is the operational core of the engine. Given a frozen
//! [`RuleSet`], a [`Replaceable`] buffer and a [`Position`], it walks the
//! cursor from `start` to `limit`, rewriting key spans as rules fire.
//!
//! ## Per-position resolution
//!
//! ```text
//! char at cursor ──▶ bucket ──▶ candidate rules (priority order)
//!                                  │
//!            ┌─────────────────────┼───────────────────────┐
//!            ▼                     ▼                       ▼
//!         Match                Partial                 Mismatch
//!   replace key span,       (incremental only)       try next rule;
//!   cursor = key start +    halt, return false,      none left: copy the
//!   cursor offset,          position untouched       char through,
//!   start = cursor                                   start = cursor + 1
//! ```
//!
//! The first candidate that does not mismatch decides. A later rule never
//! overrides an earlier pending one, even if it already matches in full:
//! otherwise the outcome would depend on how the input was chunked.
//!
//! ## Incremental mode
//!
//! With `incremental` set, running into `limit` while a rule is still
//! consistent is a `Partial` result: more text could complete or break it.
//! The loop halts without consuming anything, and the next call re-scans the
//! same position with a longer `limit`. Without `incremental`, running into
//! `limit` is a plain mismatch. Ante context lies in committed text, so it is
//! never partial.
//!
//! ## Termination
//!
//! A rule may leave the cursor on (part of) its own output, and rule sets
//! like `a > |b ; b > |a ;` rewrite forever. A step makes progress when the
//! cursor moves forward or the text left to scan gets shorter than it has
//! been since the cursor last moved. Only steps without progress count
//! against the budget, so long chains that do finish are never cut short:
//!
//! ```text
//! a > |bbbb ; b > c      a ─▶ |bbbb ─▶ c|bbb ─▶ ...    stall, then progress
//! a > |b ; b > |a        a ─▶ |b ─▶ |a ─▶ |b ─▶ ...     stalls only
//! ```
//!
//! After `max(factor, rules + 1)` stalls in a row, or once the text has grown
//! by more than `factor²` symbols per symbol the call was handed (`a > |ba`
//! moves forward but never ends), the rest of the text is committed
//! unchanged.

use super::metrics::PassMetrics;
use super::rule_set::{DispatchIndex, RuleId, RuleSet};
use crate::{Position, Replaceable, Rule, RuleError, RuleFlags, SymbolMatcher};
use std::time::Instant;
use tracing::{trace, warn};

/// Default number of consecutive steps without progress before a call gives up.
pub const DEFAULT_STEP_BUDGET_FACTOR: u32 = 16;

/// Outcome of matching one rule at one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MatchDegree {
    Mismatch,
    /// Consistent so far, but deciding needs text past `limit`.
    Partial,
    Match,
}

/// What happened at one scan position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Matched(RuleId),
    Pending(RuleId),
    NoMatch,
}

/// Applies a frozen rule set to buffers.
///
/// A `Matcher` borrows its rule set immutably and keeps no per-buffer state,
/// so one rule set can drive any number of sessions at once.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    rules: &'a RuleSet,
    index: &'a DispatchIndex,
    step_budget_factor: u32,
}

impl<'a> Matcher<'a> {
    /// Create a matcher for `rules`, which must be frozen.
    pub fn new(rules: &'a RuleSet) -> Result<Self, RuleError> {
        let index = rules.index().ok_or(RuleError::InvalidState("rule set must be frozen before matching"))?;
        Ok(Matcher { rules, index, step_budget_factor: DEFAULT_STEP_BUDGET_FACTOR })
    }

    pub fn with_step_budget_factor(mut self, factor: u32) -> Self {
        self.step_budget_factor = factor.max(1);
        self
    }

    /// Run the scan loop over `[pos.cursor, pos.limit)`.
    ///
    /// Returns `false` only when `incremental` is set and a partial match is
    /// waiting for more text; `pos` is then left exactly as it was at the
    /// pending position.
    pub fn transliterate<R: Replaceable + ?Sized>(&self, text: &mut R, pos: &mut Position, incremental: bool) -> bool {
        self.run(text, pos, incremental, None)
    }

    /// Like [`transliterate`](Self::transliterate), also recording what the
    /// pass did.
    pub fn transliterate_with_metrics<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
        incremental: bool,
    ) -> (bool, PassMetrics) {
        let mut metrics = PassMetrics::default();
        let t0 = Instant::now();
        let finished = self.run(text, pos, incremental, Some(&mut metrics));
        metrics.duration = t0.elapsed();
        (finished, metrics)
    }

    /// Resolve everything up to `limit`, treating pending partial matches as
    /// mismatches since no more text will arrive.
    pub fn finish_transliteration<R: Replaceable + ?Sized>(&self, text: &mut R, pos: &mut Position) {
        self.run(text, pos, false, None);
    }

    fn run<R: Replaceable + ?Sized>(
        &self,
        text: &mut R,
        pos: &mut Position,
        incremental: bool,
        mut metrics: Option<&mut PassMetrics>,
    ) -> bool {
        debug_assert!(pos.is_valid(text.len()), "position {pos:?} invalid for text of length {}", text.len());

        let factor = self.step_budget_factor as usize;
        let stall_limit = factor.max(self.rules.len() + 1);
        let growth_limit =
            pos.limit.saturating_add((pos.limit - pos.cursor).max(1).saturating_mul(factor.saturating_mul(factor)));
        let mut stalls = 0usize;
        let mut high_water = pos.cursor;
        let mut low_remaining = pos.limit - pos.cursor;

        while pos.cursor < pos.limit {
            if stalls == stall_limit || pos.limit > growth_limit {
                warn!(
                    stalls,
                    cursor = pos.cursor,
                    limit = pos.limit,
                    "rules stopped making progress; committing remaining text"
                );
                pos.cursor = pos.limit;
                pos.start = pos.limit;
                if let Some(m) = metrics.as_deref_mut() {
                    m.budget_exhausted = true;
                }
                break;
            }
            if let Some(m) = metrics.as_deref_mut() {
                m.steps += 1;
            }

            let Some(c) = text.char_at(pos.cursor) else {
                // Shorter buffer than the position claims; nothing left to read.
                break;
            };

            match self.resolve(c, text, pos, incremental) {
                Resolution::Matched(id) => {
                    let rule = &self.rules.rules()[id];
                    let key_start = pos.cursor;
                    let key_limit = key_start + rule.key.len();
                    text.replace(key_start, key_limit, &rule.output);
                    pos.limit = pos.limit - rule.key.len() + rule.output.len();
                    pos.cursor = key_start + rule.cursor_offset;
                    pos.start = pos.cursor;
                    trace!(rule = id, at = key_start, cursor = pos.cursor, limit = pos.limit, "replaced");
                    if let Some(m) = metrics.as_deref_mut() {
                        m.replacements += 1;
                        m.fired.push(id);
                    }
                }
                Resolution::Pending(id) => {
                    trace!(rule = id, cursor = pos.cursor, limit = pos.limit, "partial match; waiting for input");
                    if let Some(m) = metrics.as_deref_mut() {
                        m.halted = true;
                    }
                    return false;
                }
                Resolution::NoMatch => {
                    trace!(at = pos.cursor, "no rule applies; copied");
                    pos.cursor += 1;
                    pos.start = pos.cursor;
                    if let Some(m) = metrics.as_deref_mut() {
                        m.copied += 1;
                    }
                }
            }

            let remaining = pos.limit - pos.cursor;
            if pos.cursor > high_water || remaining < low_remaining {
                high_water = pos.cursor;
                low_remaining = remaining;
                stalls = 0;
            } else {
                stalls += 1;
            }
        }

        true
    }

    fn resolve<R: Replaceable + ?Sized>(&self, c: char, text: &R, pos: &Position, incremental: bool) -> Resolution {
        for &id in self.index.candidates(c) {
            match match_rule(&self.rules.rules()[id], text, pos, incremental) {
                MatchDegree::Match => return Resolution::Matched(id),
                MatchDegree::Partial => return Resolution::Pending(id),
                MatchDegree::Mismatch => {}
            }
        }
        Resolution::NoMatch
    }
}

/// Match `rule` with its key starting at `pos.cursor`.
///
/// ```text
///  context_start        cursor              limit
///       │   ◀── ante ──   │  ── key ──▶ ── post ──▶ │
///       │  (backwards)    │        (forwards)       │
/// ```
pub(crate) fn match_rule<R: Replaceable + ?Sized>(
    rule: &Rule,
    text: &R,
    pos: &Position,
    incremental: bool,
) -> MatchDegree {
    let mut i = pos.cursor;
    for m in rule.ante.iter().rev() {
        if i <= pos.context_start {
            return MatchDegree::Mismatch;
        }
        i -= 1;
        if !matches_at(m, text, i) {
            return MatchDegree::Mismatch;
        }
    }
    if rule.flags.contains(RuleFlags::ANCHOR_START) && i != pos.context_start {
        return MatchDegree::Mismatch;
    }

    let mut j = pos.cursor;
    for m in rule.key.iter().chain(rule.post.iter()) {
        if j >= pos.limit {
            return if incremental { MatchDegree::Partial } else { MatchDegree::Mismatch };
        }
        if !matches_at(m, text, j) {
            return MatchDegree::Mismatch;
        }
        j += 1;
    }
    if rule.flags.contains(RuleFlags::ANCHOR_END) {
        if j != pos.limit {
            return MatchDegree::Mismatch;
        }
        // Text appended at `limit` would break the anchor.
        if incremental {
            return MatchDegree::Partial;
        }
    }

    MatchDegree::Match
}

fn matches_at<R: Replaceable + ?Sized>(m: &SymbolMatcher, text: &R, index: usize) -> bool {
    text.char_at(index).is_some_and(|c| m.matches(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn frozen(rules: Vec<Rule>) -> RuleSet {
        let mut set = RuleSet::from_rules(rules).unwrap();
        set.freeze().unwrap();
        set
    }

    #[test]
    fn matcher_requires_frozen_set() {
        let set = RuleSet::from_rules([Rule::new("", "a", "", "b", None).unwrap()]).unwrap();
        assert!(matches!(Matcher::new(&set), Err(RuleError::InvalidState(_))));
    }

    #[test]
    fn key_running_into_limit_is_partial_only_when_incremental() {
        let rule = Rule::new("", "abc", "", "x", None).unwrap();
        let text = chars("ab");
        let pos = Position::new(0, 2);
        assert_eq!(match_rule(&rule, &text, &pos, true), MatchDegree::Partial);
        assert_eq!(match_rule(&rule, &text, &pos, false), MatchDegree::Mismatch);
    }

    #[test]
    fn inconsistent_prefix_is_mismatch_even_when_incremental() {
        let rule = Rule::new("", "abc", "", "x", None).unwrap();
        let text = chars("aq");
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 2), true), MatchDegree::Mismatch);
    }

    #[test]
    fn post_context_can_be_partial() {
        let rule = Rule::new("", "a", "b", "x", None).unwrap();
        let text = chars("a");
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 1), true), MatchDegree::Partial);
        let text = chars("ab");
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 2), true), MatchDegree::Match);
    }

    #[test]
    fn ante_stops_at_context_start() {
        let rule = Rule::new("x", "a", "", "y", None).unwrap();
        let text = chars("xa");
        let mut pos = Position::new(0, 2);
        pos.cursor = 1;
        pos.start = 1;
        assert_eq!(match_rule(&rule, &text, &pos, false), MatchDegree::Match);

        pos.context_start = 1;
        assert_eq!(match_rule(&rule, &text, &pos, true), MatchDegree::Mismatch);
    }

    #[test]
    fn anchors_pin_context_edges() {
        let rule = Rule::builder().key("a").anchor_start().anchor_end().output("x").build().unwrap();
        let text = chars("a");
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 1), false), MatchDegree::Match);
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 1), true), MatchDegree::Partial);

        let text = chars("ba");
        let pos = Position { context_start: 0, start: 1, cursor: 1, limit: 2 };
        assert_eq!(match_rule(&rule, &text, &pos, false), MatchDegree::Mismatch);

        let text = chars("ab");
        assert_eq!(match_rule(&rule, &text, &Position::new(0, 2), true), MatchDegree::Mismatch);
    }

    #[test]
    fn pending_earlier_rule_blocks_later_full_match() {
        let set = frozen(vec![Rule::new("", "abc", "", "X", None).unwrap(), Rule::new("", "a", "", "Y", None).unwrap()]);
        let matcher = Matcher::new(&set).unwrap();

        let mut text = chars("ab");
        let mut pos = Position::new(0, 2);
        assert!(!matcher.transliterate(&mut text, &mut pos, true));
        assert_eq!(pos, Position::new(0, 2));
        assert_eq!(text, chars("ab"));

        matcher.finish_transliteration(&mut text, &mut pos);
        assert_eq!(text, chars("Yb"));
        assert_eq!(pos, Position { context_start: 0, start: 2, cursor: 2, limit: 2 });
    }

    #[test]
    fn replacement_adjusts_limit_and_cursor() {
        let set = frozen(vec![Rule::new("", "ab", "", "wxyz", Some(1)).unwrap()]);
        let matcher = Matcher::new(&set).unwrap();
        let mut text = chars("abq");
        let mut pos = Position::new(0, 3);
        let (finished, metrics) = matcher.transliterate_with_metrics(&mut text, &mut pos, false);
        assert!(finished);
        assert_eq!(text, chars("wxyzq"));
        assert_eq!(pos.limit, 5);
        assert_eq!(metrics.replacements, 1);
        assert_eq!(metrics.copied, 4);
        assert_eq!(metrics.fired, vec![0]);
    }

    #[test]
    fn cycling_rules_stop_at_budget() {
        let set = frozen(vec![Rule::new("", "a", "", "b", Some(0)).unwrap(), Rule::new("", "b", "", "a", Some(0)).unwrap()]);
        let matcher = Matcher::new(&set).unwrap().with_step_budget_factor(4);
        let mut text = chars("aq");
        let mut pos = Position::new(0, 2);
        let (finished, metrics) = matcher.transliterate_with_metrics(&mut text, &mut pos, false);
        assert!(finished);
        assert!(metrics.budget_exhausted);
        assert_eq!(metrics.steps, 4);
        assert_eq!(pos, Position { context_start: 0, start: 2, cursor: 2, limit: 2 });
        assert_eq!(text, chars("aq"));
    }

    #[test]
    fn expanding_chain_runs_to_completion() {
        let set = frozen(vec![
            Rule::new("", "a", "", "bbbbbbbbbbbbbbbbbbbb", Some(0)).unwrap(),
            Rule::new("", "b", "", "c", None).unwrap(),
        ]);
        let matcher = Matcher::new(&set).unwrap();
        let mut text = chars("aa");
        let mut pos = Position::new(0, 2);
        let (_, metrics) = matcher.transliterate_with_metrics(&mut text, &mut pos, false);
        assert!(!metrics.budget_exhausted);
        assert_eq!(text, chars(&"c".repeat(40)));
        assert_eq!(pos.limit, 40);
    }

    #[test]
    fn shrinking_text_counts_as_progress() {
        let set = frozen(vec![Rule::new("", "a", "", "", None).unwrap()]);
        let matcher = Matcher::new(&set).unwrap().with_step_budget_factor(1);
        let mut text = chars("aaaaaaaab");
        let mut pos = Position::new(0, 9);
        let (_, metrics) = matcher.transliterate_with_metrics(&mut text, &mut pos, false);
        assert!(!metrics.budget_exhausted);
        assert_eq!(text, chars("b"));
    }

    #[test]
    fn endless_growth_is_cut_off() {
        let set = frozen(vec![Rule::new("", "a", "", "ba", Some(0)).unwrap()]);
        let matcher = Matcher::new(&set).unwrap().with_step_budget_factor(2);
        let mut text = chars("a");
        let mut pos = Position::new(0, 1);
        let (finished, metrics) = matcher.transliterate_with_metrics(&mut text, &mut pos, false);
        assert!(finished);
        assert!(metrics.budget_exhausted);
        assert_eq!(pos.limit, 6);
        assert_eq!(pos.start, pos.limit);
    }

    #[test]
    fn text_before_start_is_never_rewritten() {
        let set = frozen(vec![Rule::new("", "a", "", "b", None).unwrap()]);
        let matcher = Matcher::new(&set).unwrap();
        let mut text = chars("aaa");
        let mut pos = Position { context_start: 0, start: 2, cursor: 2, limit: 3 };
        assert!(matcher.transliterate(&mut text, &mut pos, false));
        assert_eq!(text, chars("aab"));
    }
}
