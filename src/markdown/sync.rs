//! Markdown ⇄ tree synchronization
//!
//! [`ContentSync`] turns the canonical markdown string into a document tree
//! for a view, and a tree back into markdown. Tables are shielded from the
//! block-level transformer: each table region is swapped for a placeholder
//! comment before block parsing, and the placeholder blocks are replaced by
//! codec-built tables afterwards.
//!
//! A [`ViewInstance`] receives its tree exactly once. Later changes to the
//! canonical string are never re-applied to a live instance; the host mounts
//! a fresh instance instead.

use log::{debug, error, warn};

use crate::config::ViewMode;
use crate::error::{Error, Result};
use crate::markdown::brackets::Selection;
use crate::markdown::parser::MarkdownOptions;
use crate::markdown::table::{find_table_regions, parse_table, serialize_table, TableRegion};
use crate::markdown::transformer::{BlockTransformer, ComrakTransformer};
use crate::markdown::tree::{
    DocumentTree, FormatFlags, HeadingLevel, NodeKey, NodeKind, TextRun,
};

/// Token that stands in for a table while the rest of the document is
/// parsed by the block-level transformer.
pub const TABLE_PLACEHOLDER: &str = "<!--TABLE_PLACEHOLDER-->";

// ─────────────────────────────────────────────────────────────────────────────
// Content Sync
// ─────────────────────────────────────────────────────────────────────────────

/// Converts between the canonical markdown string and view trees.
#[derive(Debug, Clone, Default)]
pub struct ContentSync<T: BlockTransformer = ComrakTransformer> {
    transformer: T,
}

impl ContentSync<ComrakTransformer> {
    /// Sync over the comrak transformer with the given extensions.
    pub fn with_options(options: MarkdownOptions) -> Self {
        Self::new(ComrakTransformer::new(options))
    }
}

impl<T: BlockTransformer> ContentSync<T> {
    pub fn new(transformer: T) -> Self {
        Self { transformer }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    /// Build the tree a view of `mode` shows for `canonical`.
    ///
    /// Pure: on error nothing outside the returned value has changed.
    pub fn build_tree(&self, canonical: &str, mode: ViewMode) -> Result<DocumentTree> {
        match mode {
            ViewMode::Raw => raw_tree(canonical),
            ViewMode::Rendered => self.build_structured(canonical),
        }
    }

    /// Serialize a view tree back to markdown.
    pub fn serialize_tree(&self, tree: &DocumentTree, mode: ViewMode) -> String {
        match mode {
            ViewMode::Raw => tree.text_content(tree.root()),
            ViewMode::Rendered => tree
                .children(tree.root())
                .iter()
                .map(|&block| match tree.kind(block) {
                    Some(NodeKind::Table) => serialize_table(tree, block).unwrap_or_default(),
                    _ => self.transformer.serialize_block(tree, block),
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    fn build_structured(&self, canonical: &str) -> Result<DocumentTree> {
        if canonical.trim().is_empty() {
            debug!("Empty document, bootstrapping with an empty heading");
            let mut tree = DocumentTree::new();
            let heading = tree.create(NodeKind::Heading {
                level: HeadingLevel::H1,
            });
            let root = tree.root();
            tree.append_child(root, heading)?;
            return Ok(tree);
        }

        let regions = find_table_regions(canonical);
        if regions.is_empty() {
            return self.transformer.parse(canonical);
        }

        // Substitute from the end so earlier offsets stay valid.
        let mut substituted = canonical.to_string();
        for region in regions.iter().rev() {
            substituted.replace_range(region.start..region.end(), TABLE_PLACEHOLDER);
        }

        let mut tree = self.transformer.parse(&substituted)?;
        splice_tables(&mut tree, &regions)?;
        Ok(tree)
    }
}

/// The raw view's tree: the text verbatim in a single run, or an empty root.
fn raw_tree(canonical: &str) -> Result<DocumentTree> {
    let mut tree = DocumentTree::new();
    if !canonical.is_empty() {
        let root = tree.root();
        let paragraph = tree.create(NodeKind::Paragraph);
        let run = tree.create_text(TextRun::plain(canonical));
        tree.append_child(paragraph, run)?;
        tree.append_child(root, paragraph)?;
    }
    Ok(tree)
}

/// Replace every top-level block holding a placeholder with the tables of
/// the corresponding regions, consumed in ascending order.
fn splice_tables(tree: &mut DocumentTree, regions: &[TableRegion]) -> Result<()> {
    let root = tree.root();
    let targets: Vec<(NodeKey, usize)> = tree
        .children(root)
        .iter()
        .map(|&block| (block, tree.text_content(block).matches(TABLE_PLACEHOLDER).count()))
        .filter(|&(_, count)| count > 0)
        .collect();

    let found: usize = targets.iter().map(|&(_, count)| count).sum();
    if found != regions.len() {
        error!(
            "Table placeholder mismatch: substituted {} regions but found {} placeholders",
            regions.len(),
            found
        );
        return Err(Error::PlaceholderMismatch {
            expected: regions.len(),
            found,
        });
    }

    let mut pending = regions.iter();
    for (block, count) in targets {
        if matches!(tree.kind(block), Some(NodeKind::CodeBlock { .. })) {
            // Pipe lines inside a fence are code, not a table.
            let taken: Vec<&TableRegion> = pending.by_ref().take(count).collect();
            restore_literal(tree, block, &taken);
            continue;
        }

        // Text sharing the block with a placeholder, such as an enclosing
        // HTML wrapper, is kept as raw paragraphs around the tables.
        let raw = tree.runs(block).iter().all(|run| run.is_raw());
        let text = tree.text_content(block);
        let mut pieces = text.split(TABLE_PLACEHOLDER);

        let mut anchor = keep_piece(tree, block, pieces.next(), raw)?;
        for region in pending.by_ref().take(count) {
            let replacement = match parse_table(tree, &region.text) {
                Some(table) => table,
                None => {
                    debug!("Table region at {} did not parse, keeping it as text", region.start);
                    raw_paragraph(tree, &region.text)?
                }
            };
            tree.insert_after(anchor, replacement)?;
            anchor = keep_piece(tree, replacement, pieces.next(), raw)?;
        }
        tree.remove(block)?;
    }

    debug!("Spliced {} table(s) into the document tree", regions.len());
    Ok(())
}

/// Insert the non-blank `piece` after `anchor` and return the new anchor.
///
/// Pieces of a block that was not raw markup have lost their inline
/// formatting and are dropped.
fn keep_piece(
    tree: &mut DocumentTree,
    anchor: NodeKey,
    piece: Option<&str>,
    raw: bool,
) -> Result<NodeKey> {
    let Some(piece) = piece.map(|p| p.trim_matches(|c: char| c == '\n' || c == '\r')) else {
        return Ok(anchor);
    };
    if piece.trim().is_empty() {
        return Ok(anchor);
    }
    if !raw {
        warn!("Dropping text that shared a block with a table: {:?}", piece);
        return Ok(anchor);
    }

    let paragraph = raw_paragraph(tree, piece)?;
    tree.insert_after(anchor, paragraph)?;
    Ok(paragraph)
}

/// A detached paragraph holding `text` as verbatim markdown.
fn raw_paragraph(tree: &mut DocumentTree, text: &str) -> Result<NodeKey> {
    let paragraph = tree.create(NodeKind::Paragraph);
    let run = tree.create_text(TextRun::plain(text).with_format(FormatFlags::RAW));
    tree.append_child(paragraph, run)?;
    Ok(paragraph)
}

/// Put the original region text back wherever a placeholder landed inside
/// `block`.
fn restore_literal(tree: &mut DocumentTree, block: NodeKey, regions: &[&TableRegion]) {
    let mut pending = regions.iter();
    for key in tree.descendants(block) {
        if let Some(NodeKind::Text(run)) = tree.kind_mut(key) {
            while let Some(at) = run.text.find(TABLE_PLACEHOLDER) {
                let Some(region) = pending.next() else {
                    return;
                };
                run.text
                    .replace_range(at..at + TABLE_PLACEHOLDER.len(), &region.text);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// View Instances
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a mounted view: which tab, shown in which mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewKey {
    pub tab_id: u64,
    pub mode: ViewMode,
}

/// Sync state of one view instance.
#[derive(Debug, Clone, Default)]
pub enum SyncState {
    #[default]
    Uninitialized,
    Ready(DocumentTree),
}

/// One mounted view with its one-shot initialized tree.
#[derive(Debug, Clone)]
pub struct ViewInstance {
    key: ViewKey,
    generation: u64,
    state: SyncState,
    /// Cursor in the raw view
    selection: Selection,
}

impl ViewInstance {
    pub fn new(key: ViewKey, generation: u64) -> Self {
        Self {
            key,
            generation,
            state: SyncState::Uninitialized,
            selection: Selection::default(),
        }
    }

    pub fn key(&self) -> ViewKey {
        self.key
    }

    pub fn mode(&self) -> ViewMode {
        self.key.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, SyncState::Ready(_))
    }

    /// Build this instance's tree from `canonical`.
    ///
    /// Only valid once. On failure the instance stays uninitialized.
    pub fn initialize<T: BlockTransformer>(
        &mut self,
        sync: &ContentSync<T>,
        canonical: &str,
    ) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::AlreadyInitialized);
        }
        let tree = sync.build_tree(canonical, self.key.mode)?;
        self.selection = Selection::collapsed(canonical.len());
        self.state = SyncState::Ready(tree);
        debug!(
            "Initialized {} view for tab {}",
            self.key.mode.label(),
            self.key.tab_id
        );
        Ok(())
    }

    pub fn tree(&self) -> Result<&DocumentTree> {
        match &self.state {
            SyncState::Ready(tree) => Ok(tree),
            SyncState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    pub fn tree_mut(&mut self) -> Result<&mut DocumentTree> {
        match &mut self.state {
            SyncState::Ready(tree) => Ok(tree),
            SyncState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub(crate) fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
