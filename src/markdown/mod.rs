//! Markdown ⇄ document tree synchronization
//!
//! This module converts between markdown text and an editable document tree
//! and keeps the two consistent while an editor switches between a raw-text
//! view and a structured view of the same document. Block-level parsing uses
//! the comrak library; GitHub-flavored tables are handled by a dedicated
//! codec so they survive round trips with escapes and inline code intact.
//!
//! # Features
//! - Arena-backed document tree with a rendered-element index
//! - Table codec: `|`-delimited blocks ⇄ table nodes
//! - One-shot tree initialization per mounted view, with stale-mount checks
//! - Table row/column editing, insert-table, and drag-resize
//! - Bracket auto-pairing for the raw view
//!
//! # Example
//! ```ignore
//! use crate::config::{Settings, ViewMode};
//! use crate::markdown::{EditorSession, GestureTarget, TableCommand, apply_command};
//!
//! let mut session = EditorSession::new(Settings::default());
//! session.load_content("| A |\n|---|\n| 1 |");
//! session.set_on_change(|markdown| println!("{}", markdown));
//! session.mount_and_initialize(1, ViewMode::Rendered)?;
//!
//! session.edit_tree(|tree| {
//!     let table = tree.tables()[0];
//!     apply_command(tree, GestureTarget::Node(table), TableCommand::DeleteTable)
//! })?;
//! ```

pub mod brackets;
pub mod geometry;
mod inline;
mod parser;
mod serializer;
pub mod session;
pub mod sync;
pub mod table;
pub mod table_edit;
pub mod transformer;
mod tree;

pub use brackets::{handle_key, KeyOutcome, RawBuffer, Selection};
pub use geometry::DeleteOutcome;
pub use inline::{parse_inline, render_run, render_runs};
pub use parser::{parse_markdown, parse_markdown_with_options, MarkdownOptions};
pub use serializer::{serialize_block, serialize_document};
pub use session::{ChangeCallback, EditorSession, PendingInit};
pub use sync::{ContentSync, SyncState, ViewInstance, ViewKey, TABLE_PLACEHOLDER};
pub use table::{find_table_regions, parse_table, serialize_table, TableRegion};
pub use table_edit::{
    apply_command, insert_table_at_cursor, resize_table, resolve_cell, CellContext,
    GestureTarget, ResizeAxis, TableCommand,
};
pub use transformer::{BlockTransformer, ComrakTransformer};
pub use tree::{
    Ancestors, DocumentTree, ElementId, FormatFlags, HeadingLevel, NodeKey, NodeKind, TextRun,
};
