//! Text storage seen by the matcher.
//!
//! The matcher only ever talks to [`Replaceable`]: random-access reads and
//! in-place replacement of sub-ranges, indexed by code point. Each storage
//! backend gets its own adapter and the engine never branches on which one it
//! is holding.
//!
//! ```text
//! Vec<char>     fixed width, O(1) access
//! String        UTF-8 bytes, code point index walks the string
//! Utf16Buffer   UTF-16 units, surrogate pairs count as one symbol
//! ```

use std::fmt;

/// Mutable text addressed by code point index.
pub trait Replaceable {
    /// Length in code points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The code point at `index`, or `None` past the end.
    fn char_at(&self, index: usize) -> Option<char>;

    /// Replace `[start, end)` with `text`. Indices at or after `end` shift by
    /// the length delta; indices below `start` are untouched.
    fn replace(&mut self, start: usize, end: usize, text: &[char]);

    /// Duplicate `[start, end)` at `dest`, or relocate it when `move_span` is
    /// set. `dest` must not fall strictly inside the span.
    fn copy(&mut self, start: usize, end: usize, dest: usize, move_span: bool) {
        debug_assert!(dest <= start || dest >= end, "copy destination {dest} inside {start}..{end}");
        let span: Vec<char> = (start..end).filter_map(|i| self.char_at(i)).collect();
        let n = span.len();
        self.replace(dest, dest, &span);
        if move_span {
            // The insertion shifted the source if it landed before it.
            let (s, e) = if dest <= start { (start + n, end + n) } else { (start, end) };
            self.replace(s, e, &[]);
        }
    }

    /// `[start, end)` as an owned string.
    fn extract(&self, start: usize, end: usize) -> String {
        (start..end).filter_map(|i| self.char_at(i)).collect()
    }
}

impl Replaceable for Vec<char> {
    fn len(&self) -> usize {
        <[char]>::len(self)
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.get(index).copied()
    }

    fn replace(&mut self, start: usize, end: usize, text: &[char]) {
        self.splice(start..end, text.iter().copied());
    }
}

impl Replaceable for String {
    // `String::len` counts bytes; the trait counts code points.
    fn len(&self) -> usize {
        self.chars().count()
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.chars().nth(index)
    }

    fn replace(&mut self, start: usize, end: usize, text: &[char]) {
        let from = byte_offset(self, start);
        let to = byte_offset(self, end);
        let replacement: String = text.iter().collect();
        self.replace_range(from..to, &replacement);
    }
}

fn byte_offset(s: &str, index: usize) -> usize {
    s.char_indices().nth(index).map(|(b, _)| b).unwrap_or(s.len())
}

/// UTF-16 backed text. Indices are code points: a valid surrogate pair is
/// one symbol, an unpaired surrogate is one symbol read as U+FFFD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf16Buffer {
    units: Vec<u16>,
}

impl Utf16Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Utf16Buffer { units }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }

    fn decode(&self) -> impl Iterator<Item = char> + '_ {
        char::decode_utf16(self.units.iter().copied()).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    /// Code unit offset of code point `index` (or the end of the buffer).
    fn unit_offset(&self, index: usize) -> usize {
        let units = &self.units;
        let mut offset = 0;
        let mut n = 0;
        while n < index && offset < units.len() {
            let pair = is_high_surrogate(units[offset]) && units.get(offset + 1).is_some_and(|&u| is_low_surrogate(u));
            offset += if pair { 2 } else { 1 };
            n += 1;
        }
        offset
    }
}

fn is_high_surrogate(u: u16) -> bool {
    (0xD800..0xDC00).contains(&u)
}

fn is_low_surrogate(u: u16) -> bool {
    (0xDC00..0xE000).contains(&u)
}

impl From<&str> for Utf16Buffer {
    fn from(s: &str) -> Self {
        Utf16Buffer { units: s.encode_utf16().collect() }
    }
}

impl fmt::Display for Utf16Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.decode().try_for_each(|c| fmt::Write::write_char(f, c))
    }
}

impl Replaceable for Utf16Buffer {
    fn len(&self) -> usize {
        self.decode().count()
    }

    fn char_at(&self, index: usize) -> Option<char> {
        self.decode().nth(index)
    }

    fn replace(&mut self, start: usize, end: usize, text: &[char]) {
        let from = self.unit_offset(start);
        let to = self.unit_offset(end);
        let mut scratch = [0u16; 2];
        let encoded: Vec<u16> = text.iter().flat_map(|c| c.encode_utf16(&mut scratch).to_vec()).collect();
        self.units.splice(from..to, encoded);
    }
}
