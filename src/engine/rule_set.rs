//! Rule set compilation and indexing.
//!
//! This module holds the *static* side of the engine: the rule collection in
//! declaration order and the structures derived from it when the set is
//! frozen.
//!
//! Matching is intentionally split into two phases:
//!
//! 1. **Build/freeze** (this module): collect rules with `add_rule`, then
//!    `freeze` validates them (see `masking.rs`) and builds the
//!    `DispatchIndex`.
//! 2. **Run** (see `matcher.rs`): at each scan position, look up the bucket of
//!    the character under the cursor and try its candidate rules in order.
//!
//! ## Dispatch buckets
//!
//! A bucket is the low byte of a code point (`c & 0xFF`), so there are always
//! `BUCKET_COUNT` of them and lookup is a plain array index:
//!
//! ```text
//! rules:  0: ab > x     1: [a-c] > y     2: q > z
//!
//! bucket 0x61 'a' ─▶ [0, 1]
//! bucket 0x62 'b' ─▶ [1]
//! bucket 0x63 'c' ─▶ [1]
//! bucket 0x71 'q' ─▶ [2]
//! ```
//!
//! A rule whose first key symbol is a class sits in every bucket the class
//! touches. Buckets are coarse: `Ā` (U+0100) shares bucket 0x00 with NUL, and
//! the matcher still checks the full pattern.
//!
//! ## Invariants
//!
//! - `RuleId` is an index into `RuleSet::rules`; buckets hold ids, never rule
//!   copies.
//! - Every bucket lists ids in ascending order, which is priority order.
//! - `index` is `Some` exactly when the set is frozen.

use super::masking;
use crate::{Rule, RuleError, RuleFlags, SymbolMatcher};
use tracing::debug;

/// Rule identifier (index into the rules vector, equal to its sequence number).
pub type RuleId = usize;

pub const BUCKET_COUNT: usize = 256;

/// Dispatch bucket of a character.
pub fn bucket_of(c: char) -> usize {
    (c as u32 & 0xFF) as usize
}

/// Per-bucket candidate lists built by [`RuleSet::freeze`].
#[derive(Debug, Clone)]
pub struct DispatchIndex {
    by_bucket: Box<[Vec<RuleId>; BUCKET_COUNT]>,
}

impl DispatchIndex {
    fn build(rules: &[Rule]) -> Self {
        let mut by_bucket: Box<[Vec<RuleId>; BUCKET_COUNT]> = Box::new(std::array::from_fn(|_| Vec::new()));

        // Ids are visited in ascending order, so every bucket ends up sorted.
        for (id, rule) in rules.iter().enumerate() {
            match &rule.key[0] {
                SymbolMatcher::Literal(c) => by_bucket[bucket_of(*c)].push(id),
                SymbolMatcher::Class(class) => {
                    let mut touched = [false; BUCKET_COUNT];
                    for &(lo, hi) in class.ranges() {
                        if hi - lo >= BUCKET_COUNT as u32 - 1 {
                            touched = [true; BUCKET_COUNT];
                            break;
                        }
                        for cp in lo..=hi {
                            touched[(cp & 0xFF) as usize] = true;
                        }
                    }
                    for (bucket, _) in touched.iter().enumerate().filter(|(_, t)| **t) {
                        by_bucket[bucket].push(id);
                    }
                }
            }
        }

        DispatchIndex { by_bucket }
    }

    /// Candidate rules for a scan position whose character is `c`.
    pub fn candidates(&self, c: char) -> &[RuleId] {
        &self.by_bucket[bucket_of(c)]
    }

    /// Number of buckets with at least one rule.
    pub fn populated_buckets(&self) -> usize {
        self.by_bucket.iter().filter(|b| !b.is_empty()).count()
    }
}

/// An ordered rule collection plus the index derived from it.
///
/// Usage: `add_rule` in priority order, `freeze`, then hand the set to a
/// [`Matcher`](super::Matcher). `reset` reopens a frozen set for more rules;
/// it must be frozen again before use.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: Option<DispatchIndex>,
    max_context_length: usize,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect `rules` in order into an unfrozen set.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self, RuleError> {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add_rule(rule)?;
        }
        Ok(set)
    }

    /// Append a rule. Its sequence number becomes its position in the set.
    pub fn add_rule(&mut self, mut rule: Rule) -> Result<(), RuleError> {
        if self.is_frozen() {
            return Err(RuleError::InvalidState("cannot add a rule to a frozen rule set; call reset() first"));
        }
        rule.validate()?;
        rule.sequence_number = self.rules.len();
        self.rules.push(rule);
        Ok(())
    }

    /// Drop the index so more rules can be added.
    pub fn reset(&mut self) {
        self.index = None;
    }

    /// Check for masked rules and build the dispatch index.
    ///
    /// Safe to call repeatedly; each call rebuilds from scratch. On error the
    /// set stays unfrozen.
    pub fn freeze(&mut self) -> Result<(), RuleError> {
        self.index = None;

        let index = DispatchIndex::build(&self.rules);
        let max_context_length = self.rules.iter().map(Rule::context_length).max().unwrap_or(0);

        if let Some(found) = masking::find_masked(&self.rules) {
            let masking = &self.rules[found.masking];
            let masked = &self.rules[found.masked];
            debug!(masking = found.masking, masked = found.masked, "masked rule rejected");
            return Err(RuleError::MaskedRule {
                masked: found.masked,
                masking: found.masking,
                description: format!("{masking} masks {masked}"),
            });
        }

        debug!(
            rules = self.rules.len(),
            max_context_length,
            populated_buckets = index.populated_buckets(),
            anchored = self.rules.iter().filter(|r| !r.flags.is_empty()).count(),
            "rule set frozen"
        );

        self.index = Some(index);
        self.max_context_length = max_context_length;
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.index.is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id)
    }

    /// The dispatch index, if frozen.
    pub fn index(&self) -> Option<&DispatchIndex> {
        self.index.as_ref()
    }

    /// Longest preceding context any rule needs. Callers discarding committed
    /// text must keep at least this many characters before `start`.
    pub fn max_context_length(&self) -> usize {
        self.max_context_length
    }

    /// True if any rule carries `flag`.
    pub fn uses(&self, flag: RuleFlags) -> bool {
        self.rules.iter().any(|r| r.flags.contains(flag))
    }

    /// Render every rule in notation form, one per line.
    pub fn to_rules(&self) -> String {
        self.rules.iter().map(|r| r.to_string()).collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CharClass;

    fn literal(key: &str, output: &str) -> Rule {
        Rule::new("", key, "", output, None).unwrap()
    }

    #[test]
    fn add_rule_assigns_sequence_numbers() {
        let mut set = RuleSet::new();
        set.add_rule(literal("a", "x")).unwrap();
        set.add_rule(literal("b", "y")).unwrap();
        assert_eq!(set.rules()[0].sequence_number(), 0);
        assert_eq!(set.rules()[1].sequence_number(), 1);
    }

    #[test]
    fn add_rule_after_freeze_is_invalid_state() {
        let mut set = RuleSet::new();
        set.add_rule(literal("a", "x")).unwrap();
        set.freeze().unwrap();
        assert!(matches!(set.add_rule(literal("b", "y")), Err(RuleError::InvalidState(_))));

        set.reset();
        assert!(!set.is_frozen());
        set.add_rule(literal("b", "y")).unwrap();
        set.freeze().unwrap();
        assert_eq!(set.index().unwrap().candidates('b'), &[1]);
    }

    #[test]
    fn buckets_keep_declaration_order() {
        let vowels = CharClass::from_chars("vowel", "aeiou".chars());
        let mut set = RuleSet::new();
        set.add_rule(literal("ab", "x")).unwrap();
        set.add_rule(Rule::new("", vowels, "", "v", None).unwrap()).unwrap();
        set.add_rule(literal("q", "z")).unwrap();
        set.freeze().unwrap();

        let index = set.index().unwrap();
        assert_eq!(index.candidates('a'), &[0, 1]);
        assert_eq!(index.candidates('e'), &[1]);
        assert_eq!(index.candidates('q'), &[2]);
        assert!(index.candidates('z').is_empty());
        // U+0161 shares the low byte of 'a'.
        assert_eq!(index.candidates('\u{161}'), &[0, 1]);
    }

    #[test]
    fn wide_class_lands_in_every_bucket() {
        let any = CharClass::new("any", ['\0'..='\u{10FFFF}']);
        let mut set = RuleSet::new();
        set.add_rule(Rule::new("", any, "", "", None).unwrap()).unwrap();
        set.freeze().unwrap();
        assert_eq!(set.index().unwrap().populated_buckets(), BUCKET_COUNT);
    }

    #[test]
    fn max_context_length_counts_ante_and_start_anchor() {
        let mut set = RuleSet::new();
        set.add_rule(Rule::new("xy", "a", "", "b", None).unwrap()).unwrap();
        set.add_rule(Rule::builder().ante("pqr").key("c").anchor_start().output("d").build().unwrap()).unwrap();
        set.freeze().unwrap();
        assert_eq!(set.max_context_length(), 4);
        assert!(set.uses(RuleFlags::ANCHOR_START));
        assert!(!set.uses(RuleFlags::ANCHOR_END));
    }

    #[test]
    fn failed_freeze_leaves_set_unfrozen() {
        let mut set = RuleSet::new();
        set.add_rule(literal("a", "x")).unwrap();
        set.add_rule(literal("ab", "y")).unwrap();
        let err = set.freeze().unwrap_err();
        assert!(matches!(err, RuleError::MaskedRule { masked: 1, masking: 0, .. }));
        assert!(!set.is_frozen());
    }

    #[test]
    fn from_rules_keeps_order() {
        let set = RuleSet::from_rules([literal("a", "x"), literal("b", "y")]).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.to_rules(), "a > x ;\nb > y ;");
    }
}
