//! Char-offset helpers. Offsets in this crate count `char`s, never bytes.

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the char at `offset`, or `s.len()` past the end.
pub(crate) fn byte_index(s: &str, offset: usize) -> usize {
    s.char_indices().nth(offset).map_or(s.len(), |(i, _)| i)
}

pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let from = byte_index(s, start);
    let to = byte_index(s, end).max(from);
    &s[from..to]
}
