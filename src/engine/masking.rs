//! Masked rule detection.
//!
//! Rules are tried strictly in declaration order, so a later rule is dead if
//! an earlier one matches every text it would match. `RuleSet::freeze`
//! rejects such sets rather than silently dropping the dead rule.
//!
//! ## Criterion
//!
//! Exact subsumption over character classes is expensive, so the test is
//! conservative: it only reports pairs where masking is certain. Patterns are
//! aligned at the first key symbol:
//!
//! ```text
//! r1:      aakkkpp          r1 masks r2 when
//! r2:     aaakkkkkppp       - r1's ante is no longer than r2's
//!            ^              - r1's key+post is no longer than r2's
//!                           - on equal key+post, r1's key is
//!                             no longer than r2's
//!                           - each r1 symbol ⊇ the aligned r2 symbol
//!                           - r1's anchors are implied by r2's
//! ```
//!
//! Every symbol r1 reads then lies inside the span r2 matched, and accepts
//! the character there, so r1 is a full match wherever r2 is.
//!
//! Anchors need the aligned edges to coincide: `^ab` is implied by `^ab` but
//! not by `ab` or `x{ab}`, since only an equally long anchored ante proves
//! the text starts where r1 needs it to.
//!
//! ```text
//!         ab   ^ab    ab$  ^ab$      (row masks column?)
//!   ab    Y     Y     Y     Y
//!  ^ab    N     Y     N     Y
//!   ab$   N     N     Y     Y
//!  ^ab$   N     N     N     Y
//! ```
//!
//! Missed detections (for example a class-keyed rule that masks a longer
//! rule only through its post context's class) are allowed; false positives
//! are not.

use super::rule_set::RuleId;
use crate::{Rule, RuleFlags};

/// A pair of rules where `masking` makes `masked` unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Masking {
    pub masking: RuleId,
    pub masked: RuleId,
}

/// Find the first masked rule (lowest `masked` id, then lowest `masking` id).
pub(crate) fn find_masked(rules: &[Rule]) -> Option<Masking> {
    (1..rules.len())
        .find_map(|j| (0..j).find(|&i| masks(&rules[i], &rules[j])).map(|i| Masking { masking: i, masked: j }))
}

/// True if `r1`, tried before `r2`, matches wherever `r2` would.
pub(crate) fn masks(r1: &Rule, r2: &Rule) -> bool {
    let left = r1.ante.len();
    let left2 = r2.ante.len();
    let right = r1.key.len() + r1.post.len();
    let right2 = r2.key.len() + r2.post.len();

    // On equal spans r1's key must not reach into r2's post context.
    if left > left2 || right > right2 || (right == right2 && r1.key.len() > r2.key.len()) {
        return false;
    }

    if r1.flags.contains(RuleFlags::ANCHOR_START) && !(r2.flags.contains(RuleFlags::ANCHOR_START) && left == left2) {
        return false;
    }
    if r1.flags.contains(RuleFlags::ANCHOR_END) && !(r2.flags.contains(RuleFlags::ANCHOR_END) && right == right2) {
        return false;
    }

    // Ante aligns at its end (next to the key), the rest at the key start.
    let ante_covers = r1.ante.iter().rev().zip(r2.ante.iter().rev()).all(|(a, b)| a.is_superset_of(b));
    let rest_covers = r1
        .key
        .iter()
        .chain(r1.post.iter())
        .zip(r2.key.iter().chain(r2.post.iter()))
        .all(|(a, b)| a.is_superset_of(b));

    ante_covers && rest_covers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CharClass;

    fn rule(ante: &str, key: &str, post: &str) -> Rule {
        Rule::new(ante, key, post, "x", None).unwrap()
    }

    fn anchored(key: &str, start: bool, end: bool) -> Rule {
        let mut b = Rule::builder().key(key).output("x");
        if start {
            b = b.anchor_start();
        }
        if end {
            b = b.anchor_end();
        }
        b.build().unwrap()
    }

    #[test]
    fn shorter_key_masks_longer_key() {
        assert!(masks(&rule("", "a", ""), &rule("", "ab", "")));
        assert!(!masks(&rule("", "ab", ""), &rule("", "a", "")));
    }

    #[test]
    fn longer_key_masks_inside_a_longer_span() {
        // ab matches everywhere a}bc does.
        assert!(masks(&rule("", "ab", ""), &rule("", "a", "bc")));
        assert!(!masks(&rule("", "abc", ""), &rule("", "a", "bc")));
    }

    #[test]
    fn identical_patterns_mask() {
        assert!(masks(&rule("", "ab", ""), &rule("", "ab", "")));
    }

    #[test]
    fn post_context_masks_longer_key_but_not_vice_versa() {
        // {a}b matches everything ab matches.
        assert!(masks(&rule("", "a", "b"), &rule("", "ab", "")));
        assert!(!masks(&rule("", "ab", ""), &rule("", "a", "b")));
    }

    #[test]
    fn stricter_ante_does_not_mask() {
        assert!(!masks(&rule("x", "a", ""), &rule("", "a", "")));
        assert!(masks(&rule("", "a", ""), &rule("x", "a", "")));
        assert!(masks(&rule("y", "a", ""), &rule("xy", "a", "")));
        assert!(!masks(&rule("x", "a", ""), &rule("xy", "a", "")));
    }

    #[test]
    fn class_masks_its_members_only() {
        let lower = CharClass::new("lower", ['a'..='z']);
        let vowel = CharClass::from_chars("vowel", "aeiou".chars());
        let by_lower = Rule::new("", lower.clone(), "", "x", None).unwrap();
        let by_vowel = Rule::new("", vowel, "", "x", None).unwrap();

        assert!(masks(&by_lower, &rule("", "e", "")));
        assert!(masks(&by_lower, &by_vowel));
        assert!(!masks(&by_vowel, &by_lower));
        assert!(!masks(&by_lower, &rule("", "E", "")));
    }

    #[test]
    fn literal_never_masks_a_wider_class() {
        let vowel = CharClass::from_chars("vowel", "aeiou".chars());
        assert!(!masks(&rule("", "a", ""), &Rule::new("", vowel, "", "x", None).unwrap()));
    }

    #[test]
    fn anchor_table() {
        let cases = [(false, false), (true, false), (false, true), (true, true)];
        let expected = [
            [true, true, true, true],
            [false, true, false, true],
            [false, false, true, true],
            [false, false, false, true],
        ];
        for (row, &(s1, e1)) in cases.iter().enumerate() {
            for (col, &(s2, e2)) in cases.iter().enumerate() {
                let r1 = anchored("ab", s1, e1);
                let r2 = anchored("ab", s2, e2);
                assert_eq!(masks(&r1, &r2), expected[row][col], "row {row} col {col}");
            }
        }
    }

    #[test]
    fn start_anchor_needs_equal_ante() {
        let r1 = Rule::builder().key("a").anchor_start().output("x").build().unwrap();
        let r2 = Rule::builder().ante("q").key("a").anchor_start().output("y").build().unwrap();
        assert!(!masks(&r1, &r2));
    }

    #[test]
    fn find_masked_reports_lowest_masked_rule() {
        let rules = vec![rule("", "q", ""), rule("", "a", ""), rule("", "ab", ""), rule("", "a", "c")];
        assert_eq!(find_masked(&rules), Some(Masking { masking: 1, masked: 2 }));
        assert_eq!(find_masked(&rules[..2]), None);
    }
}
