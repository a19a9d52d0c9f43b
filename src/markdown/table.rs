//! GitHub-flavored table codec
//!
//! Tables are the one block type parsed and serialized by hand instead of
//! through the block-level transformer. This module turns a block of
//! `|`-delimited lines into a `Table` node and back, and locates table
//! regions inside a whole document so they can be shielded from the
//! block-level transformer.
//!
//! # Parsing rules
//! - A row candidate is a line that, trimmed, starts and ends with `|`.
//! - A separator row contains only whitespace, `-`, `:` and `|` between the
//!   outer pipes, and at least one `-` (so a row of blank cells is never a
//!   separator).
//! - Row 0 is a header only when a separator appears after the first line.
//! - Cells split on `|` not preceded by `\`; `\|` unescapes to `|`.

use log::{debug, warn};

use crate::error::Result;
use crate::markdown::inline::{parse_inline, render_runs};
use crate::markdown::tree::{DocumentTree, NodeKey, NodeKind, TextRun};

/// Separator cell emitted after the first serialized row.
const SEPARATOR_CELL: &str = "---";

// ─────────────────────────────────────────────────────────────────────────────
// Line Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Content between the outer pipes of a row candidate.
fn row_content(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('|') && trimmed.ends_with('|') {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// Whether row content (outer pipes stripped) is a separator row.
pub fn is_separator_row(content: &str) -> bool {
    !content.is_empty()
        && content
            .chars()
            .all(|c| c.is_whitespace() || matches!(c, '-' | ':' | '|'))
        && content.contains('-')
}

/// A `|…|` line with at least one character between the pipes.
fn is_pipe_line(line: &str) -> bool {
    row_content(line).map_or(false, |c| !c.is_empty())
}

fn is_separator_line(line: &str) -> bool {
    row_content(line).map_or(false, is_separator_row)
}

/// Split row content on unescaped pipes, unescaping and trimming each cell.
fn split_cells(content: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut prev = None;

    for ch in content.chars() {
        if ch == '|' && prev != Some('\\') {
            cells.push(finish_cell(&current));
            current.clear();
        } else {
            current.push(ch);
        }
        prev = Some(ch);
    }
    cells.push(finish_cell(&current));
    cells
}

fn finish_cell(raw: &str) -> String {
    raw.replace("\\|", "|").trim().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a block of table lines into a detached `Table` node of `tree`.
///
/// Returns `None` when the block has fewer than two row candidates or no
/// data rows remain once separators are removed. A rejected block is not an
/// error: the caller leaves it as ordinary text.
pub fn parse_table(tree: &mut DocumentTree, block_text: &str) -> Option<NodeKey> {
    let mut candidates = 0;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for (index, line) in block_text.trim().lines().enumerate() {
        let Some(content) = row_content(line) else {
            continue;
        };
        candidates += 1;
        if is_separator_row(content) {
            has_header |= index > 0;
            continue;
        }
        rows.push(split_cells(content));
    }

    if candidates < 2 || rows.is_empty() {
        debug!(
            "Rejected table block: {} candidate lines, {} data rows",
            candidates,
            rows.len()
        );
        return None;
    }

    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut rows {
        row.resize(width, String::new());
    }

    match build_table(tree, &rows, has_header) {
        Ok(table) => Some(table),
        Err(e) => {
            warn!("Failed to build table node: {}", e);
            None
        }
    }
}

fn build_table(tree: &mut DocumentTree, rows: &[Vec<String>], has_header: bool) -> Result<NodeKey> {
    let table = tree.create(NodeKind::Table);
    for (row_index, cells) in rows.iter().enumerate() {
        let row = tree.create(NodeKind::TableRow);
        for text in cells {
            let cell = create_cell(tree, has_header && row_index == 0, parse_inline(text))?;
            tree.append_child(row, cell)?;
        }
        tree.append_child(table, row)?;
    }
    Ok(table)
}

/// Create a detached cell holding one paragraph of `runs`.
pub(crate) fn create_cell(
    tree: &mut DocumentTree,
    is_header: bool,
    runs: Vec<TextRun>,
) -> Result<NodeKey> {
    let cell = tree.create(NodeKind::TableCell { is_header });
    let paragraph = tree.create(NodeKind::Paragraph);
    for run in runs {
        let text = tree.create_text(run);
        tree.append_child(paragraph, text)?;
    }
    tree.append_child(cell, paragraph)?;
    Ok(cell)
}

/// Create a detached row of `columns` empty cells.
pub(crate) fn create_empty_row(
    tree: &mut DocumentTree,
    columns: usize,
    is_header: bool,
) -> Result<NodeKey> {
    let row = tree.create(NodeKind::TableRow);
    for _ in 0..columns {
        let cell = create_cell(tree, is_header, Vec::new())?;
        tree.append_child(row, cell)?;
    }
    Ok(row)
}

// ─────────────────────────────────────────────────────────────────────────────
// Serialization
// ─────────────────────────────────────────────────────────────────────────────

/// Serialize a `Table` node to GFM table lines.
///
/// The first row is always followed by a `|---|` separator, so row 1 becomes
/// the header after a round trip. Returns `None` for non-table nodes and for
/// tables without any rows.
pub fn serialize_table(tree: &DocumentTree, node: NodeKey) -> Option<String> {
    if !tree.kind(node)?.is_table() {
        return None;
    }

    let mut lines: Vec<String> = Vec::new();
    for &row in tree.children(node) {
        if tree.kind(row) != Some(&NodeKind::TableRow) {
            continue;
        }
        let cells: Vec<String> = tree
            .children(row)
            .iter()
            .filter(|&&cell| tree.kind(cell).map_or(false, NodeKind::is_table_cell))
            .map(|&cell| format!(" {} ", escape_pipes(&cell_markdown(tree, cell))))
            .collect();
        if cells.is_empty() {
            continue;
        }

        lines.push(format!("|{}|", cells.join("|")));
        if lines.len() == 1 {
            let separator = vec![SEPARATOR_CELL; cells.len()].join("|");
            lines.push(format!("|{}|", separator));
        }
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Markdown text of one cell, formatting markers included.
fn cell_markdown(tree: &DocumentTree, cell: NodeKey) -> String {
    let mut text = String::new();
    for &child in tree.children(cell) {
        match tree.kind(child) {
            Some(NodeKind::Paragraph) => text.push_str(&render_runs(tree.runs(child))),
            _ => text.push_str(&tree.text_content(child)),
        }
    }
    text
}

/// Escape `|` unless a backtick sits directly on either side of it.
///
/// This is a heuristic: a pipe next to a code span delimiter is assumed to
/// belong to the code span, which under-escapes `a|` followed by code and
/// over-escapes pipes deep inside a code span.
fn escape_pipes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &ch) in chars.iter().enumerate() {
        let after_tick = i > 0 && chars[i - 1] == '`';
        let before_tick = chars.get(i + 1) == Some(&'`');
        if ch == '|' && !after_tick && !before_tick {
            out.push_str("\\|");
        } else {
            out.push(ch);
        }
    }
    out
}

/// Cell texts of a table, row by row, for inspection and tests.
pub fn cell_texts(tree: &DocumentTree, table: NodeKey) -> Vec<Vec<String>> {
    tree.children(table)
        .iter()
        .map(|&row| {
            tree.children(row)
                .iter()
                .map(|&cell| tree.text_content(cell))
                .collect()
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Region Scanning
// ─────────────────────────────────────────────────────────────────────────────

/// A table found inside a larger markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRegion {
    /// Byte offset of the first table line
    pub start: usize,
    /// Byte length of the region, final line break excluded
    pub len: usize,
    /// The region's text
    pub text: String,
}

impl TableRegion {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Find every table region in `markdown`, in ascending offset order.
///
/// A region is a `|…|` line, directly followed by a separator line, followed
/// by any number of further `|…|` lines.
pub fn find_table_regions(markdown: &str) -> Vec<TableRegion> {
    let mut lines: Vec<(usize, &str)> = Vec::new();
    let mut offset = 0;
    for raw in markdown.split_inclusive('\n') {
        lines.push((offset, raw.trim_end_matches(['\n', '\r'])));
        offset += raw.len();
    }

    let mut regions = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let starts_table = is_pipe_line(lines[i].1)
            && lines.get(i + 1).map_or(false, |(_, l)| is_separator_line(l));
        if !starts_table {
            i += 1;
            continue;
        }

        let mut last = i + 1;
        while lines.get(last + 1).map_or(false, |(_, l)| is_pipe_line(l)) {
            last += 1;
        }

        let start = lines[i].0;
        let end = lines[last].0 + lines[last].1.len();
        regions.push(TableRegion {
            start,
            len: end - start,
            text: markdown[start..end].to_string(),
        });
        i = last + 1;
    }

    debug!("Found {} table region(s)", regions.len());
    regions
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
