//! Structural table editing
//!
//! Context-menu commands, the insert-table command, and drag-resize handles
//! all start from a gesture target: a rendered element, or a node somewhere
//! inside a cell. The target is resolved to its cell, row, and table, and the
//! edit is applied to that one table through the geometry primitives.
//!
//! New tables are always inserted beside the top-level block holding the
//! cursor, never inside it, so no edit here can nest one table in another.

use log::debug;

use crate::config::TableDimensions;
use crate::error::{Error, Result};
use crate::markdown::geometry;
use crate::markdown::table::create_empty_row;
use crate::markdown::tree::{DocumentTree, ElementId, NodeKey, NodeKind};

/// Cell width assumed when the host cannot measure one.
pub const DEFAULT_CELL_WIDTH: f32 = 100.0;
/// Row height assumed when the host cannot measure one.
pub const DEFAULT_CELL_HEIGHT: f32 = 40.0;

// ─────────────────────────────────────────────────────────────────────────────
// Gesture Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// What a gesture points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureTarget {
    /// A rendered element, resolved through the tree's element index
    Element(ElementId),
    /// A node, e.g. the cursor's anchor or a cell key
    Node(NodeKey),
}

/// Location of a cell inside its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellContext {
    pub table: NodeKey,
    pub row: NodeKey,
    pub cell: NodeKey,
    pub row_index: usize,
    pub col_index: usize,
}

/// Resolve a gesture target to the cell that contains it.
pub fn resolve_cell(tree: &DocumentTree, target: GestureTarget) -> Result<CellContext> {
    let key = match target {
        GestureTarget::Element(element) => tree.node_for_element(element)?,
        GestureTarget::Node(key) => key,
    };
    if !tree.contains(key) {
        return Err(Error::NodeNotFound(key));
    }

    let cell = tree
        .find_ancestor(key, NodeKind::is_table_cell)
        .ok_or(Error::NotInTable)?;
    let row = tree
        .parent(cell)
        .filter(|&row| tree.kind(row) == Some(&NodeKind::TableRow))
        .ok_or(Error::NotInTable)?;
    let table = tree
        .parent(row)
        .filter(|&table| tree.kind(table).map_or(false, NodeKind::is_table))
        .ok_or(Error::NotInTable)?;

    Ok(CellContext {
        table,
        row,
        cell,
        row_index: tree.index_in_parent(row).unwrap_or(0),
        col_index: tree.index_in_parent(cell).unwrap_or(0),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Table context-menu commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableCommand {
    InsertRowAbove,
    InsertRowBelow,
    InsertColumnLeft,
    InsertColumnRight,
    DeleteRow,
    DeleteColumn,
    DeleteTable,
}

impl TableCommand {
    /// Get a display label for the command.
    pub fn label(&self) -> &'static str {
        match self {
            TableCommand::InsertRowAbove => "Insert Row Above",
            TableCommand::InsertRowBelow => "Insert Row Below",
            TableCommand::InsertColumnLeft => "Insert Column Left",
            TableCommand::InsertColumnRight => "Insert Column Right",
            TableCommand::DeleteRow => "Delete Row",
            TableCommand::DeleteColumn => "Delete Column",
            TableCommand::DeleteTable => "Delete Table",
        }
    }

    /// Every command, in menu order.
    pub fn all() -> &'static [TableCommand] {
        &[
            TableCommand::InsertRowAbove,
            TableCommand::InsertRowBelow,
            TableCommand::InsertColumnLeft,
            TableCommand::InsertColumnRight,
            TableCommand::DeleteRow,
            TableCommand::DeleteColumn,
            TableCommand::DeleteTable,
        ]
    }
}

/// Run `command` on the table containing `target`.
pub fn apply_command(
    tree: &mut DocumentTree,
    target: GestureTarget,
    command: TableCommand,
) -> Result<()> {
    let ctx = resolve_cell(tree, target)?;
    debug!(
        "{} at row {}, column {} of table {}",
        command.label(),
        ctx.row_index,
        ctx.col_index,
        ctx.table
    );

    match command {
        TableCommand::InsertRowAbove => {
            geometry::insert_row(tree, ctx.table, ctx.row_index)?;
        }
        TableCommand::InsertRowBelow => {
            geometry::insert_row(tree, ctx.table, ctx.row_index + 1)?;
        }
        TableCommand::InsertColumnLeft => geometry::insert_column(tree, ctx.table, ctx.col_index)?,
        TableCommand::InsertColumnRight => {
            geometry::insert_column(tree, ctx.table, ctx.col_index + 1)?
        }
        TableCommand::DeleteRow => {
            geometry::delete_row(tree, ctx.table, ctx.row_index)?;
        }
        TableCommand::DeleteColumn => {
            geometry::delete_column(tree, ctx.table, ctx.col_index)?;
        }
        TableCommand::DeleteTable => {
            geometry::delete_table(tree, ctx.table)?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Table Insertion
// ─────────────────────────────────────────────────────────────────────────────

/// Build a detached table of empty cells; row 0 is the header row.
fn build_empty_table(tree: &mut DocumentTree, dims: TableDimensions) -> Result<NodeKey> {
    let table = tree.create(NodeKind::Table);
    for index in 0..dims.rows.max(1) {
        let row = create_empty_row(tree, dims.columns.max(1), index == 0)?;
        tree.append_child(table, row)?;
    }
    Ok(table)
}

/// Insert a new empty table after the top-level block holding `cursor`.
///
/// With no cursor, or a cursor on the root itself, the table is appended to
/// the document. Returns the new table's key.
pub fn insert_table_at_cursor(
    tree: &mut DocumentTree,
    cursor: Option<NodeKey>,
    dims: TableDimensions,
) -> Result<NodeKey> {
    if let Some(key) = cursor {
        if !tree.contains(key) {
            return Err(Error::NodeNotFound(key));
        }
    }

    let table = build_empty_table(tree, dims)?;
    match cursor.and_then(|key| tree.top_level_block(key)) {
        Some(block) => {
            debug!("Inserting {}x{} table after block {}", dims.rows, dims.columns, block);
            tree.insert_after(block, table)?;
        }
        None => {
            debug!("Appending {}x{} table to the document", dims.rows, dims.columns);
            let root = tree.root();
            tree.append_child(root, table)?;
        }
    }
    Ok(table)
}

// ─────────────────────────────────────────────────────────────────────────────
// Drag Resize
// ─────────────────────────────────────────────────────────────────────────────

/// Which resize handle was dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeAxis {
    /// Bottom handle: adds rows
    Rows,
    /// Right handle: adds columns
    Columns,
}

impl ResizeAxis {
    fn default_cell_size(self) -> f32 {
        match self {
            ResizeAxis::Rows => DEFAULT_CELL_HEIGHT,
            ResizeAxis::Columns => DEFAULT_CELL_WIDTH,
        }
    }
}

/// Grow the table containing `target` after a drag of `delta_px` pixels.
///
/// One row or column is appended per whole `cell_px` dragged; a missing or
/// non-positive cell size falls back to the default for the axis. Dragging
/// inward never removes anything. Returns how many rows or columns were added.
pub fn resize_table(
    tree: &mut DocumentTree,
    target: NodeKey,
    axis: ResizeAxis,
    delta_px: f32,
    cell_px: Option<f32>,
) -> Result<usize> {
    if !tree.contains(target) {
        return Err(Error::NodeNotFound(target));
    }
    let table = tree
        .find_ancestor(target, NodeKind::is_table)
        .ok_or(Error::NotInTable)?;

    let cell_size = cell_px
        .filter(|size| *size > 0.0)
        .unwrap_or_else(|| axis.default_cell_size());
    let count = (delta_px.max(0.0) / cell_size).floor() as usize;
    if count == 0 {
        return Ok(0);
    }

    for _ in 0..count {
        match axis {
            ResizeAxis::Rows => {
                let end = geometry::row_count(tree, table);
                geometry::insert_row(tree, table, end)?;
            }
            ResizeAxis::Columns => {
                let end = geometry::column_count(tree, table);
                geometry::insert_column(tree, table, end)?;
            }
        }
    }

    debug!("Resize added {} {:?} to table {}", count, axis, table);
    Ok(count)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
