//! Row and column insertion and deletion on table nodes
//!
//! These primitives keep every row of a table at the same width and keep the
//! header flag on row 0 only: a table that had a header row before an edit
//! has its first row marked as header afterwards, whichever row that now is.

use log::debug;

use crate::error::{Error, Result};
use crate::markdown::table::{create_cell, create_empty_row};
use crate::markdown::tree::{DocumentTree, NodeKey, NodeKind};

/// What a delete left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The row or column is gone, the table remains
    Deleted,
    /// It was the last row or column, so the whole table was removed
    TableRemoved,
}

fn ensure_table(tree: &DocumentTree, table: NodeKey) -> Result<()> {
    match tree.kind(table) {
        Some(NodeKind::Table) => Ok(()),
        Some(other) => Err(Error::InvalidStructure(format!(
            "expected a table, found a {}",
            other.name()
        ))),
        None => Err(Error::NodeNotFound(table)),
    }
}

pub fn row_count(tree: &DocumentTree, table: NodeKey) -> usize {
    tree.children(table).len()
}

/// Width of the table, taken from its first row.
pub fn column_count(tree: &DocumentTree, table: NodeKey) -> usize {
    tree.children(table)
        .first()
        .map_or(0, |&row| tree.children(row).len())
}

/// Whether the first row is a header row.
pub fn has_header(tree: &DocumentTree, table: NodeKey) -> bool {
    tree.children(table)
        .first()
        .and_then(|&row| tree.children(row).first())
        .map_or(false, |&cell| {
            matches!(tree.kind(cell), Some(NodeKind::TableCell { is_header: true }))
        })
}

/// Mark row 0 as header (when `header` is set) and every other row as data.
fn normalize_header(tree: &mut DocumentTree, table: NodeKey, header: bool) {
    let rows = tree.children(table).to_vec();
    for (index, row) in rows.into_iter().enumerate() {
        let cells = tree.children(row).to_vec();
        for cell in cells {
            if let Some(NodeKind::TableCell { is_header }) = tree.kind_mut(cell) {
                *is_header = header && index == 0;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Insertion
// ─────────────────────────────────────────────────────────────────────────────

/// Insert an empty row at `index` (clamped to the row count).
pub fn insert_row(tree: &mut DocumentTree, table: NodeKey, index: usize) -> Result<NodeKey> {
    ensure_table(tree, table)?;
    let header = has_header(tree, table);
    let columns = column_count(tree, table).max(1);

    let row = create_empty_row(tree, columns, false)?;
    tree.insert_child(table, index, row)?;
    normalize_header(tree, table, header);

    debug!("Inserted row at {} into table {}", index, table);
    Ok(row)
}

/// Insert an empty cell at `index` (clamped) in every row.
pub fn insert_column(tree: &mut DocumentTree, table: NodeKey, index: usize) -> Result<()> {
    ensure_table(tree, table)?;
    let header = has_header(tree, table);

    let rows = tree.children(table).to_vec();
    for row in rows {
        let cell = create_cell(tree, false, Vec::new())?;
        tree.insert_child(row, index, cell)?;
    }
    normalize_header(tree, table, header);

    debug!("Inserted column at {} into table {}", index, table);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Deletion
// ─────────────────────────────────────────────────────────────────────────────

/// Delete the row at `index`.
pub fn delete_row(tree: &mut DocumentTree, table: NodeKey, index: usize) -> Result<DeleteOutcome> {
    ensure_table(tree, table)?;
    let rows = row_count(tree, table);
    if index >= rows {
        return Err(Error::InvalidStructure(format!(
            "row {} out of range for table {} with {} rows",
            index, table, rows
        )));
    }
    if rows == 1 {
        return delete_table(tree, table);
    }

    let header = has_header(tree, table);
    let row = tree.children(table)[index];
    tree.remove(row)?;
    normalize_header(tree, table, header);

    debug!("Deleted row {} from table {}", index, table);
    Ok(DeleteOutcome::Deleted)
}

/// Delete the cell at `index` from every row.
pub fn delete_column(
    tree: &mut DocumentTree,
    table: NodeKey,
    index: usize,
) -> Result<DeleteOutcome> {
    ensure_table(tree, table)?;
    let columns = column_count(tree, table);
    if index >= columns {
        return Err(Error::InvalidStructure(format!(
            "column {} out of range for table {} with {} columns",
            index, table, columns
        )));
    }
    if columns == 1 {
        return delete_table(tree, table);
    }

    let rows = tree.children(table).to_vec();
    for row in rows {
        if let Some(&cell) = tree.children(row).get(index) {
            tree.remove(cell)?;
        }
    }

    debug!("Deleted column {} from table {}", index, table);
    Ok(DeleteOutcome::Deleted)
}

/// Remove the whole table.
pub fn delete_table(tree: &mut DocumentTree, table: NodeKey) -> Result<DeleteOutcome> {
    ensure_table(tree, table)?;
    tree.remove(table)?;
    debug!("Removed table {}", table);
    Ok(DeleteOutcome::TableRemoved)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::table::{cell_texts, parse_table};

    fn table_tree(markdown: &str) -> (DocumentTree, NodeKey) {
        let mut tree = DocumentTree::new();
        let table = parse_table(&mut tree, markdown).unwrap();
        let root = tree.root();
        tree.append_child(root, table).unwrap();
        (tree, table)
    }

    fn header_rows(tree: &DocumentTree, table: NodeKey) -> Vec<bool> {
        tree.children(table)
            .iter()
            .map(|&row| {
                tree.children(row)
                    .iter()
                    .all(|&c| matches!(tree.kind(c), Some(NodeKind::TableCell { is_header: true })))
            })
            .collect()
    }

    const GRID: &str = "| A | B |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |";

    // ─────────────────────────────────────────────────────────────────────────
    // Rows
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_insert_row_in_middle() {
        let (mut tree, table) = table_tree(GRID);
        insert_row(&mut tree, table, 2).unwrap();
        assert_eq!(
            cell_texts(&tree, table),
            vec![
                vec!["A", "B"],
                vec!["1", "2"],
                vec!["", ""],
                vec!["3", "4"]
            ]
        );
        assert_eq!(header_rows(&tree, table), vec![true, false, false, false]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_insert_row_above_header_moves_header_flag() {
        let (mut tree, table) = table_tree(GRID);
        insert_row(&mut tree, table, 0).unwrap();
        assert_eq!(cell_texts(&tree, table)[0], vec!["", ""]);
        assert_eq!(header_rows(&tree, table), vec![true, false, false, false]);
    }

    #[test]
    fn test_insert_row_index_is_clamped() {
        let (mut tree, table) = table_tree(GRID);
        insert_row(&mut tree, table, 99).unwrap();
        assert_eq!(row_count(&tree, table), 4);
        assert_eq!(cell_texts(&tree, table)[3], vec!["", ""]);
    }

    #[test]
    fn test_delete_header_row_promotes_next() {
        let (mut tree, table) = table_tree(GRID);
        assert_eq!(delete_row(&mut tree, table, 0).unwrap(), DeleteOutcome::Deleted);
        assert_eq!(cell_texts(&tree, table)[0], vec!["1", "2"]);
        assert_eq!(header_rows(&tree, table), vec![true, false]);
    }

    #[test]
    fn test_delete_last_row_removes_table() {
        let (mut tree, table) = table_tree("| only |\n|---|");
        assert_eq!(row_count(&tree, table), 1);
        assert_eq!(
            delete_row(&mut tree, table, 0).unwrap(),
            DeleteOutcome::TableRemoved
        );
        assert!(!tree.contains(table));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_delete_row_out_of_range() {
        let (mut tree, table) = table_tree(GRID);
        assert!(matches!(
            delete_row(&mut tree, table, 3),
            Err(Error::InvalidStructure(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Columns
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_insert_column_keeps_widths_equal() {
        let (mut tree, table) = table_tree(GRID);
        insert_column(&mut tree, table, 1).unwrap();
        assert_eq!(
            cell_texts(&tree, table),
            vec![vec!["A", "", "B"], vec!["1", "", "2"], vec!["3", "", "4"]]
        );
        assert_eq!(header_rows(&tree, table), vec![true, false, false]);
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_delete_column() {
        let (mut tree, table) = table_tree(GRID);
        assert_eq!(
            delete_column(&mut tree, table, 0).unwrap(),
            DeleteOutcome::Deleted
        );
        assert_eq!(
            cell_texts(&tree, table),
            vec![vec!["B"], vec!["2"], vec!["4"]]
        );
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn test_delete_last_column_removes_table() {
        let (mut tree, table) = table_tree("| a |\n|---|\n| b |");
        assert_eq!(
            delete_column(&mut tree, table, 0).unwrap(),
            DeleteOutcome::TableRemoved
        );
        assert!(tree.tables().is_empty());
    }

    #[test]
    fn test_operations_reject_non_tables() {
        let mut tree = DocumentTree::new();
        let para = tree.create(NodeKind::Paragraph);
        assert!(insert_row(&mut tree, para, 0).is_err());
        assert!(delete_column(&mut tree, para, 0).is_err());
        assert!(matches!(
            delete_table(&mut tree, NodeKey::from_raw(99)),
            Err(Error::NodeNotFound(_))
        ));
    }
}
