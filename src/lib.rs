extern crate self as translit;

#[macro_use]
mod macros;
mod api;
mod engine;
mod error;
mod notation;
mod replaceable;

use std::fmt;
use std::ops::RangeInclusive;

pub use api::{Options, Transliterator};
pub use engine::{
    BUCKET_COUNT, DispatchIndex, Matcher, PassMetrics, RuleId, RuleSet, RunMetrics, RunResult, bucket_of,
};
pub use error::{NotationError, RuleDefect, RuleError};
pub use notation::parse_rules;
pub use replaceable::{Replaceable, Utf16Buffer};

// --- Symbol matchers ---------------------------------------------------------

/// Highest Unicode scalar value, used as the universe for class complements.
const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Code points that are not scalar values; never stored in a class.
const SURROGATES: (u32, u32) = (0xD800, 0xDFFF);

/// A named, immutable set of code points.
///
/// Members are kept as sorted, non-overlapping, non-adjacent inclusive
/// ranges, so two classes with the same members always have the same
/// representation:
///
/// ```text
/// [a-c b x-z d]  ──normalize──▶  [(a,d), (x,z)]
/// ```
///
/// Equality compares members only; the name is a label for diagnostics.
#[derive(Debug, Clone)]
pub struct CharClass {
    name: String,
    ranges: Vec<(u32, u32)>,
}

impl CharClass {
    /// Build a class from inclusive character ranges.
    pub fn new(name: impl Into<String>, ranges: impl IntoIterator<Item = RangeInclusive<char>>) -> Self {
        let raw = ranges.into_iter().map(|r| (*r.start() as u32, *r.end() as u32)).filter(|(lo, hi)| lo <= hi);
        CharClass { name: name.into(), ranges: normalize(raw.collect()) }
    }

    /// Build a class from individual members.
    pub fn from_chars(name: impl Into<String>, chars: impl IntoIterator<Item = char>) -> Self {
        CharClass::new(name, chars.into_iter().map(|c| c..=c))
    }

    /// The class containing every code point not in `self`.
    pub fn complement(&self, name: impl Into<String>) -> Self {
        let mut ranges = Vec::with_capacity(self.ranges.len() + 1);
        let mut next = 0u32;
        for &(lo, hi) in &self.ranges {
            if lo > next {
                ranges.push((next, lo - 1));
            }
            next = hi + 1;
        }
        if next <= MAX_CODE_POINT {
            ranges.push((next, MAX_CODE_POINT));
        }
        CharClass { name: name.into(), ranges: normalize(ranges) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member ranges as `(low, high)` scalar values, inclusive.
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < cp {
                    std::cmp::Ordering::Less
                } else if lo > cp {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True if every member of `other` is a member of `self`.
    ///
    /// Because ranges are merged when adjacent, a contiguous range of `other`
    /// is covered only if it lies inside a single range of `self`.
    pub fn is_superset_of(&self, other: &CharClass) -> bool {
        other.ranges.iter().all(|&(lo, hi)| self.ranges.iter().any(|&(slo, shi)| slo <= lo && hi <= shi))
    }

    /// The only member, if the class has exactly one.
    pub fn single_member(&self) -> Option<char> {
        match self.ranges.as_slice() {
            [(lo, hi)] if lo == hi => char::from_u32(*lo),
            _ => None,
        }
    }
}

impl PartialEq for CharClass {
    fn eq(&self, other: &Self) -> bool {
        self.ranges == other.ranges
    }
}

impl Eq for CharClass {}

fn normalize(mut ranges: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    ranges.sort_unstable();
    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    // Every range endpoint must be a `char`, so split around the surrogates.
    merged
        .into_iter()
        .flat_map(|(lo, hi)| [(lo, hi.min(SURROGATES.0 - 1)), (lo.max(SURROGATES.1 + 1), hi)])
        .filter(|(lo, hi)| lo <= hi)
        .collect()
}

/// One position of a rule pattern: a literal code point or a character class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolMatcher {
    Literal(char),
    Class(CharClass),
}

impl SymbolMatcher {
    pub fn matches(&self, c: char) -> bool {
        match self {
            SymbolMatcher::Literal(l) => *l == c,
            SymbolMatcher::Class(class) => class.contains(c),
        }
    }

    /// True if this matcher accepts every character `other` accepts.
    ///
    /// ```text
    /// self \ other │ Literal(b)        │ Class(B)
    /// ─────────────┼───────────────────┼──────────────────────
    /// Literal(a)   │ a == b            │ B == {a}
    /// Class(A)     │ A contains b      │ A ⊇ B
    /// ```
    pub fn is_superset_of(&self, other: &SymbolMatcher) -> bool {
        match (self, other) {
            (SymbolMatcher::Literal(a), SymbolMatcher::Literal(b)) => a == b,
            (SymbolMatcher::Literal(a), SymbolMatcher::Class(b)) => b.single_member() == Some(*a),
            (SymbolMatcher::Class(a), SymbolMatcher::Literal(b)) => a.contains(*b),
            (SymbolMatcher::Class(a), SymbolMatcher::Class(b)) => a.is_superset_of(b),
        }
    }
}

impl From<char> for SymbolMatcher {
    fn from(c: char) -> Self {
        SymbolMatcher::Literal(c)
    }
}

impl From<CharClass> for SymbolMatcher {
    fn from(class: CharClass) -> Self {
        SymbolMatcher::Class(class)
    }
}

// Trait to convert rule builder arguments into matcher sequences
pub trait IntoMatchers {
    fn into_matchers(self) -> Vec<SymbolMatcher>;
}

impl IntoMatchers for &str {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        self.chars().map(SymbolMatcher::Literal).collect()
    }
}

impl IntoMatchers for char {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        vec![SymbolMatcher::Literal(self)]
    }
}

impl IntoMatchers for CharClass {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        vec![SymbolMatcher::Class(self)]
    }
}

impl IntoMatchers for SymbolMatcher {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        vec![self]
    }
}

impl IntoMatchers for Vec<SymbolMatcher> {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        self
    }
}

impl<const N: usize> IntoMatchers for [SymbolMatcher; N] {
    fn into_matchers(self) -> Vec<SymbolMatcher> {
        self.into()
    }
}

// --- Rules -------------------------------------------------------------------

bitflags::bitflags! {
    /// Anchors constraining where a rule's context may sit.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// `^`: the ante context must begin at the context start.
        const ANCHOR_START = 1 << 0;
        /// `$`: the post context must end at the limit.
        const ANCHOR_END   = 1 << 1;
    }
}

/// A normalized match/replace unit.
///
/// ```text
///   ante      key       post
/// ┌───────┬─────────┬────────┐
/// │ x y   │ a b     │ c      │   matched around the cursor
/// └───────┴─────────┴────────┘
///            ▲ cursor (key start)
///
/// key span ──replace──▶ output, cursor ──▶ key start + cursor_offset
/// ```
///
/// Only the key span is rewritten; context is read, never consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub(crate) ante: Vec<SymbolMatcher>,
    pub(crate) key: Vec<SymbolMatcher>,
    pub(crate) post: Vec<SymbolMatcher>,
    pub(crate) output: Vec<char>,
    pub(crate) cursor_offset: usize,
    pub(crate) flags: RuleFlags,
    /// Declaration index, assigned by `RuleSet::add_rule`.
    pub(crate) sequence_number: usize,
}

impl Rule {
    /// Build a rule from its parts. `cursor_offset` defaults to the end of
    /// `output` when `None`.
    pub fn new(
        ante: impl IntoMatchers,
        key: impl IntoMatchers,
        post: impl IntoMatchers,
        output: &str,
        cursor_offset: Option<usize>,
    ) -> Result<Self, RuleError> {
        let output: Vec<char> = output.chars().collect();
        let rule = Rule {
            ante: ante.into_matchers(),
            key: key.into_matchers(),
            post: post.into_matchers(),
            cursor_offset: cursor_offset.unwrap_or(output.len()),
            output,
            flags: RuleFlags::empty(),
            sequence_number: 0,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    pub(crate) fn validate(&self) -> Result<(), RuleError> {
        if self.key.is_empty() {
            return Err(RuleError::InvalidRule(RuleDefect::EmptyKey));
        }
        if self.cursor_offset > self.output.len() {
            return Err(RuleError::InvalidRule(RuleDefect::CursorOutOfRange {
                cursor: self.cursor_offset,
                output_len: self.output.len(),
            }));
        }
        Ok(())
    }

    pub fn ante(&self) -> &[SymbolMatcher] {
        &self.ante
    }

    pub fn key(&self) -> &[SymbolMatcher] {
        &self.key
    }

    pub fn post(&self) -> &[SymbolMatcher] {
        &self.post
    }

    pub fn output(&self) -> &[char] {
        &self.output
    }

    pub fn cursor_offset(&self) -> usize {
        self.cursor_offset
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    pub fn sequence_number(&self) -> usize {
        self.sequence_number
    }

    /// Number of characters this rule needs to see before the cursor.
    /// A start anchor counts as one more, since the rule must be able to
    /// tell that nothing precedes its ante context.
    pub fn context_length(&self) -> usize {
        self.ante.len() + usize::from(self.flags.contains(RuleFlags::ANCHOR_START))
    }
}

/// Incremental construction of a [`Rule`]; see also the `rule!` macro.
#[derive(Debug, Default, Clone)]
pub struct RuleBuilder {
    ante: Vec<SymbolMatcher>,
    key: Vec<SymbolMatcher>,
    post: Vec<SymbolMatcher>,
    output: Vec<char>,
    cursor_offset: Option<usize>,
    flags: RuleFlags,
}

impl RuleBuilder {
    pub fn ante(mut self, ante: impl IntoMatchers) -> Self {
        self.ante = ante.into_matchers();
        self
    }

    pub fn key(mut self, key: impl IntoMatchers) -> Self {
        self.key = key.into_matchers();
        self
    }

    pub fn post(mut self, post: impl IntoMatchers) -> Self {
        self.post = post.into_matchers();
        self
    }

    pub fn output(mut self, output: &str) -> Self {
        self.output = output.chars().collect();
        self
    }

    pub fn cursor(mut self, offset: usize) -> Self {
        self.cursor_offset = Some(offset);
        self
    }

    pub fn anchor_start(mut self) -> Self {
        self.flags |= RuleFlags::ANCHOR_START;
        self
    }

    pub fn anchor_end(mut self) -> Self {
        self.flags |= RuleFlags::ANCHOR_END;
        self
    }

    pub fn build(self) -> Result<Rule, RuleError> {
        let rule = Rule {
            cursor_offset: self.cursor_offset.unwrap_or(self.output.len()),
            ante: self.ante,
            key: self.key,
            post: self.post,
            output: self.output,
            flags: self.flags,
            sequence_number: 0,
        };
        rule.validate()?;
        Ok(rule)
    }
}

// --- Scan position -----------------------------------------------------------

/// Per-session scan state.
///
/// ```text
/// context_start     start/cursor            limit
///      │ committed,     │  pending input      │
///      │ readable as    │  (may be rewritten) │
///      ▼ ante context   ▼                     ▼
///  ... a  b  c  d  e  f  g  h  i  j  k  l  m  ...
/// ```
///
/// Invariant: `context_start <= start <= cursor <= limit <= text length`.
/// Text before `start` is final; the matcher never rewrites it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Look-back floor: ante context is never matched before this index.
    pub context_start: usize,
    /// Commit boundary.
    pub start: usize,
    /// Next index to attempt a match at.
    pub cursor: usize,
    /// End of the text currently available.
    pub limit: usize,
}

impl Position {
    /// A position scanning `[start, limit)` that may look back to `start`.
    pub fn new(start: usize, limit: usize) -> Self {
        Position { context_start: start, start, cursor: start, limit }
    }

    pub fn is_valid(&self, len: usize) -> bool {
        self.context_start <= self.start && self.start <= self.cursor && self.cursor <= self.limit && self.limit <= len
    }

    /// Pull every index back into `[0, len]` while keeping the ordering
    /// invariant. Used by the public API instead of failing on bad input.
    pub(crate) fn clamp_to(&mut self, len: usize) {
        self.limit = self.limit.min(len);
        self.cursor = self.cursor.min(self.limit);
        self.start = self.start.min(self.cursor);
        self.context_start = self.context_start.min(self.start);
    }
}

// --- Rendering ---------------------------------------------------------------

/// Characters with a meaning in rule notation; escaped when rendered.
pub(crate) const SPECIAL_CHARS: &[char] = &['{', '}', '[', ']', '>', '|', '^', '$', ';', '#', '\\', '-'];

pub(crate) fn write_escaped(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    if c.is_whitespace() || c.is_control() {
        write!(f, "\\u{{{:X}}}", c as u32)
    } else if SPECIAL_CHARS.contains(&c) {
        write!(f, "\\{c}")
    } else {
        write!(f, "{c}")
    }
}

fn write_code_point(f: &mut fmt::Formatter<'_>, cp: u32) -> fmt::Result {
    match char::from_u32(cp) {
        Some(c) => write_escaped(f, c),
        None => write!(f, "\\u{{{cp:X}}}"),
    }
}

impl fmt::Display for SymbolMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolMatcher::Literal(c) => write_escaped(f, *c),
            SymbolMatcher::Class(class) => {
                f.write_str("[")?;
                for &(lo, hi) in class.ranges() {
                    write_code_point(f, lo)?;
                    if hi > lo {
                        f.write_str("-")?;
                        write_code_point(f, hi)?;
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// Renders rule notation: `^ ante { key } post $ > out|put ;`.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_seq = |f: &mut fmt::Formatter<'_>, seq: &[SymbolMatcher]| -> fmt::Result {
            for m in seq {
                write!(f, "{m}")?;
            }
            Ok(())
        };

        if self.flags.contains(RuleFlags::ANCHOR_START) {
            f.write_str("^")?;
        }
        if !self.ante.is_empty() {
            write_seq(f, &self.ante)?;
            f.write_str(" { ")?;
        }
        write_seq(f, &self.key)?;
        if !self.post.is_empty() {
            f.write_str(" } ")?;
            write_seq(f, &self.post)?;
        }
        if self.flags.contains(RuleFlags::ANCHOR_END) {
            f.write_str("$")?;
        }
        f.write_str(" > ")?;
        for (i, c) in self.output.iter().enumerate() {
            if i == self.cursor_offset && self.cursor_offset != self.output.len() {
                f.write_str("|")?;
            }
            write_escaped(f, *c)?;
        }
        f.write_str(" ;")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower() -> CharClass {
        CharClass::new("lower", ['a'..='z'])
    }

    #[test]
    fn char_class_normalizes_ranges() {
        let class = CharClass::new("mixed", ['x'..='z', 'a'..='c', 'b'..='d', 'e'..='e']);
        assert_eq!(class.ranges(), &[('a' as u32, 'e' as u32), ('x' as u32, 'z' as u32)]);
        assert!(class.contains('e'));
        assert!(!class.contains('f'));
    }

    #[test]
    fn char_class_complement_excludes_members() {
        let alnum = CharClass::new("alnum", ['0'..='9', 'a'..='z', 'A'..='Z']);
        let special = alnum.complement("special");
        assert!(special.contains('-'));
        assert!(special.contains('\u{10FFFF}'));
        assert!(!special.contains('q'));
        assert!(!special.contains('7'));
        assert_eq!(special.complement("again"), alnum);
    }

    #[test]
    fn char_class_ranges_skip_surrogates() {
        let wide = CharClass::new("wide", ['\u{D7FF}'..='\u{E000}']);
        assert_eq!(wide.ranges(), &[(0xD7FF, 0xD7FF), (0xE000, 0xE000)]);

        let low = CharClass::new("private", ['\u{E000}'..='\u{10FFFF}']).complement("low");
        assert_eq!(low.ranges(), &[(0, 0xD7FF)]);
        assert!(low.ranges().iter().all(|&(lo, hi)| char::from_u32(lo).is_some() && char::from_u32(hi).is_some()));
    }

    #[test]
    fn superset_relation_covers_literals_and_classes() {
        let a = SymbolMatcher::Literal('a');
        let lower = SymbolMatcher::Class(lower());
        let only_a = SymbolMatcher::Class(CharClass::from_chars("a", ['a']));
        let vowels = SymbolMatcher::Class(CharClass::from_chars("vowel", "aeiou".chars()));

        assert!(lower.is_superset_of(&a));
        assert!(!a.is_superset_of(&lower));
        assert!(a.is_superset_of(&only_a));
        assert!(lower.is_superset_of(&vowels));
        assert!(!vowels.is_superset_of(&lower));
    }

    #[test]
    fn empty_key_is_rejected() {
        let err = Rule::builder().output("x").build().unwrap_err();
        assert_eq!(err, RuleError::InvalidRule(RuleDefect::EmptyKey));
    }

    #[test]
    fn cursor_beyond_output_is_rejected() {
        let err = Rule::new("", "a", "", "xy", Some(3)).unwrap_err();
        assert_eq!(err, RuleError::InvalidRule(RuleDefect::CursorOutOfRange { cursor: 3, output_len: 2 }));
    }

    #[test]
    fn cursor_defaults_to_output_end() {
        let rule = Rule::new("", "ab", "", "xyz", None).unwrap();
        assert_eq!(rule.cursor_offset(), 3);
    }

    #[test]
    fn display_renders_notation() {
        let rule = Rule::builder().ante("x").key("ab").post(lower()).output("p|q").anchor_end().build().unwrap();
        assert_eq!(rule.to_string(), "x { ab } [a-z]$ > p|q ;");

        let plain = Rule::new("", "a", "", "{ }", None).unwrap();
        assert_eq!(plain.to_string(), "a > \\{\\u{20}\\} ;");
    }

    #[test]
    fn position_clamps_into_buffer() {
        let mut pos = Position { context_start: 4, start: 6, cursor: 9, limit: 12 };
        pos.clamp_to(5);
        assert_eq!(pos, Position { context_start: 4, start: 5, cursor: 5, limit: 5 });
        assert!(pos.is_valid(5));
    }
}
