//! User settings for markdown-sync
//!
//! This module defines the `Settings` struct that holds the editing
//! preferences the sync layer reads, with serde support for JSON persistence.

use serde::{Deserialize, Serialize};

use crate::markdown::MarkdownOptions;

// ─────────────────────────────────────────────────────────────────────────────
// View Mode Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Editor view modes for markdown editing.
///
/// Two modes are available:
/// - `Raw`: Plain markdown text editing; the tree is a single text run
/// - `Rendered`: Structured editing over the parsed document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Raw markdown text editing
    Raw,
    /// Structured editing of rendered blocks
    #[default]
    Rendered,
}

impl ViewMode {
    /// Toggle between Raw and Rendered modes.
    pub fn toggle(&self) -> Self {
        match self {
            ViewMode::Raw => ViewMode::Rendered,
            ViewMode::Rendered => ViewMode::Raw,
        }
    }

    /// Get a display label for the mode.
    pub fn label(&self) -> &'static str {
        match self {
            ViewMode::Raw => "Raw",
            ViewMode::Rendered => "Rendered",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Table Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Size of a table created by the insert-table command.
///
/// `rows` counts every row, the header row included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDimensions {
    pub rows: usize,
    pub columns: usize,
}

impl Default for TableDimensions {
    fn default() -> Self {
        Self {
            rows: 3,
            columns: 3,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// Editing preferences.
///
/// Settings are constructed explicitly and handed to the session; nothing
/// reads them from global state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// View mode `EditorSession::mount_default` opens views in
    pub view_mode: ViewMode,

    /// Auto-pair `[` / `(` and skip over `]` / `)` in the raw view
    pub bracket_pairing: bool,

    /// Dimensions of tables created by the insert-table command
    pub new_table: TableDimensions,

    /// Markdown extensions used by the block-level transformer
    pub markdown: MarkdownOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Rendered,
            bracket_pairing: true,
            new_table: TableDimensions::default(),
            markdown: MarkdownOptions::default(),
        }
    }
}

impl Settings {
    /// Smallest table dimension the insert-table command accepts.
    pub const MIN_TABLE_DIMENSION: usize = 1;
    /// Largest table dimension the insert-table command accepts.
    pub const MAX_TABLE_DIMENSION: usize = 50;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.new_table.rows = self
            .new_table
            .rows
            .clamp(Self::MIN_TABLE_DIMENSION, Self::MAX_TABLE_DIMENSION);
        self.new_table.columns = self
            .new_table
            .columns
            .clamp(Self::MIN_TABLE_DIMENSION, Self::MAX_TABLE_DIMENSION);
    }

    /// Load settings and sanitize them to ensure validity.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
