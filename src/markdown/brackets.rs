//! Bracket auto-pairing for the raw-text view
//!
//! Each keystroke in the raw view runs one transition over a [`RawBuffer`].
//! Typing `[` wraps or replaces the selection with `[]`, typing `(` right
//! after `]` opens a `()` pair for a link target, and typing a closing
//! bracket in front of the same character steps over it instead of inserting
//! a duplicate. Every other key is left to the host.

use log::debug;
use std::ops::Range;

use crate::string_utils::{
    byte_index_to_char_index, char_after, char_before, char_index_to_byte_index,
    floor_char_boundary,
};

// ─────────────────────────────────────────────────────────────────────────────
// Buffer Types
// ─────────────────────────────────────────────────────────────────────────────

/// A text selection as byte offsets. `head` is where the cursor sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    /// A collapsed selection (plain cursor) at `pos`.
    pub fn collapsed(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// The selected byte range, ordered.
    pub fn range(&self) -> Range<usize> {
        self.anchor.min(self.head)..self.anchor.max(self.head)
    }
}

/// Text of the raw view together with its selection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawBuffer {
    pub text: String,
    pub selection: Selection,
}

impl RawBuffer {
    /// A buffer with the cursor at the end of `text`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        Self {
            text,
            selection: Selection::collapsed(end),
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.set_selection(selection);
        self
    }

    /// Set the selection, snapping both ends onto character boundaries.
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Selection {
            anchor: floor_char_boundary(&self.text, selection.anchor),
            head: floor_char_boundary(&self.text, selection.head),
        };
    }

    /// Set the selection from character indices, as reported by text widgets.
    pub fn set_char_selection(&mut self, anchor: usize, head: usize) {
        self.selection = Selection {
            anchor: char_index_to_byte_index(&self.text, anchor),
            head: char_index_to_byte_index(&self.text, head),
        };
    }

    /// The selection as `(anchor, head)` character indices.
    pub fn char_selection(&self) -> (usize, usize) {
        (
            byte_index_to_char_index(&self.text, self.selection.anchor),
            byte_index_to_char_index(&self.text, self.selection.head),
        )
    }

    /// Replace the selection with `insert`, leaving the cursor after it.
    pub fn insert_text(&mut self, insert: &str) {
        let range = self.selection.range();
        self.text.replace_range(range.clone(), insert);
        self.selection = Selection::collapsed(range.start + insert.len());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Key Handling
// ─────────────────────────────────────────────────────────────────────────────

/// Result of offering a keystroke to the pairing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The engine changed the buffer; the host must not insert the key.
    Handled,
    /// The engine did nothing; the host inserts the key as usual.
    PassThrough,
}

/// Run one pairing transition for `key` over `buffer`.
///
/// # Example
/// ```ignore
/// let mut buffer = RawBuffer::new("see ");
/// assert_eq!(handle_key(&mut buffer, '['), KeyOutcome::Handled);
/// assert_eq!(buffer.text, "see []");
/// ```
pub fn handle_key(buffer: &mut RawBuffer, key: char) -> KeyOutcome {
    buffer.set_selection(buffer.selection);
    let selection = buffer.selection;
    let cursor = selection.head;

    let outcome = match key {
        '[' => {
            let range = selection.range();
            buffer.text.replace_range(range.clone(), "[]");
            buffer.selection = Selection::collapsed(range.start + 1);
            KeyOutcome::Handled
        }
        '(' if selection.is_collapsed() && char_before(&buffer.text, cursor) == Some(']') => {
            buffer.text.insert_str(cursor, "()");
            buffer.selection = Selection::collapsed(cursor + 1);
            KeyOutcome::Handled
        }
        ']' | ')' if selection.is_collapsed() && char_after(&buffer.text, cursor) == Some(key) => {
            buffer.selection = Selection::collapsed(cursor + key.len_utf8());
            KeyOutcome::Handled
        }
        _ => KeyOutcome::PassThrough,
    };

    debug!("Bracket key {:?} at {}: {:?}", key, cursor, outcome);
    outcome
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
