//! UTF-8 safe cursor helpers
//!
//! Cursor positions in the raw-text view are byte offsets into the buffer.
//! Hosts may report positions that fall inside a multi-byte character, or
//! count in characters rather than bytes; these helpers turn such positions
//! into valid slice boundaries and read the characters around them.
//!
//! # Example
//! ```ignore
//! use crate::string_utils::{char_after, floor_char_boundary};
//!
//! let text = "på]";
//! let cursor = floor_char_boundary(text, 2); // inside 'å', snaps to 1
//! assert_eq!(char_after(text, 3), Some(']'));
//! ```

/// Returns the largest index `<= index` that lies on a character boundary.
///
/// Indices past the end clamp to the string length.
#[inline]
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// The character ending exactly at byte offset `index`.
#[inline]
pub fn char_before(s: &str, index: usize) -> Option<char> {
    let index = floor_char_boundary(s, index);
    s[..index].chars().next_back()
}

/// The character starting exactly at byte offset `index`.
#[inline]
pub fn char_after(s: &str, index: usize) -> Option<char> {
    let index = floor_char_boundary(s, index);
    s[index..].chars().next()
}

/// Convert a character index to a byte offset, clamping to the end.
pub fn char_index_to_byte_index(s: &str, char_index: usize) -> usize {
    s.char_indices()
        .nth(char_index)
        .map(|(byte, _)| byte)
        .unwrap_or(s.len())
}

/// Convert a byte offset to a character index.
pub fn byte_index_to_char_index(s: &str, byte_index: usize) -> usize {
    let byte_index = floor_char_boundary(s, byte_index);
    s[..byte_index].chars().count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
