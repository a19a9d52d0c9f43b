//! Arena-backed document tree
//!
//! Every node lives in a flat arena and is addressed by a [`NodeKey`] that is
//! assigned at creation and never reused within the same tree. Rendered
//! elements (whatever the host UI draws for a node) are mapped back to keys
//! through a side index, so resolving a click or context-menu target is a
//! single hash lookup instead of a walk over a live node map.
//!
//! # Structure rules
//! - A `Table` holds only `TableRow`s; every row of one table has the same
//!   number of `TableCell`s.
//! - A `TableCell` holds exactly one `Paragraph` of `Text` runs.
//! - No `Table` is ever a descendant of another `Table`. Attach operations
//!   refuse to create such a tree.

use bitflags::bitflags;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Stable identifier of a node inside one [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u32);

impl NodeKey {
    /// Build a key from its raw arena slot.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a rendered element, as handed out by the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Content
// ─────────────────────────────────────────────────────────────────────────────

/// Heading level (H1-H6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    H1 = 1,
    H2 = 2,
    H3 = 3,
    H4 = 4,
    H5 = 5,
    H6 = 6,
}

impl HeadingLevel {
    /// Numeric level, 1 through 6.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl From<u8> for HeadingLevel {
    fn from(level: u8) -> Self {
        match level {
            0 | 1 => HeadingLevel::H1,
            2 => HeadingLevel::H2,
            3 => HeadingLevel::H3,
            4 => HeadingLevel::H4,
            5 => HeadingLevel::H5,
            _ => HeadingLevel::H6,
        }
    }
}

bitflags! {
    /// Inline formatting carried by a text run.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormatFlags: u8 {
        const BOLD          = 1 << 0;
        const ITALIC        = 1 << 1;
        const STRIKETHROUGH = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const CODE          = 1 << 4;
        /// Markdown source kept verbatim: HTML and images
        const RAW           = 1 << 5;
    }
}

/// A span of text sharing one set of formatting flags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRun {
    pub text: String,
    pub format: FormatFlags,
    pub link_url: Option<String>,
}

impl TextRun {
    /// Unformatted text.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Inline code.
    pub fn code(text: impl Into<String>) -> Self {
        Self::plain(text).with_format(FormatFlags::CODE)
    }

    #[must_use]
    pub fn with_format(mut self, format: FormatFlags) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_link(mut self, url: impl Into<String>) -> Self {
        self.link_url = Some(url.into());
        self
    }

    pub fn is_code(&self) -> bool {
        self.format.contains(FormatFlags::CODE)
    }

    pub fn is_raw(&self) -> bool {
        self.format.contains(FormatFlags::RAW)
    }
}

/// The kind of a document node, together with its kind-specific data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Heading { level: HeadingLevel },
    Paragraph,
    /// `start` is the number of the first item; 1 for bullet lists
    List { ordered: bool, start: usize },
    ListItem,
    Quote,
    CodeBlock { language: String },
    ThematicBreak,
    Table,
    TableRow,
    TableCell { is_header: bool },
    Text(TextRun),
}

impl NodeKind {
    pub fn is_table(&self) -> bool {
        matches!(self, NodeKind::Table)
    }

    pub fn is_table_cell(&self) -> bool {
        matches!(self, NodeKind::TableCell { .. })
    }

    /// Short name used in log and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Heading { .. } => "heading",
            NodeKind::Paragraph => "paragraph",
            NodeKind::List { .. } => "list",
            NodeKind::ListItem => "list item",
            NodeKind::Quote => "quote",
            NodeKind::CodeBlock { .. } => "code block",
            NodeKind::ThematicBreak => "thematic break",
            NodeKind::Table => "table",
            NodeKind::TableRow => "table row",
            NodeKind::TableCell { .. } => "table cell",
            NodeKind::Text(_) => "text",
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Document Tree
// ─────────────────────────────────────────────────────────────────────────────

/// A document tree owned by a single view instance.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Option<Node>>,
    root: NodeKey,
    elements: HashMap<ElementId, NodeKey>,
}

impl Default for DocumentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentTree {
    /// Create a tree holding only an empty root.
    pub fn new() -> Self {
        let root = Node {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![Some(root)],
            root: NodeKey(0),
            elements: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of live nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root).is_empty()
    }

    /// Allocate a detached node.
    pub fn create(&mut self, kind: NodeKind) -> NodeKey {
        let key = NodeKey(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            kind,
            parent: None,
            children: Vec::new(),
        }));
        key
    }

    /// Allocate a detached text node.
    pub fn create_text(&mut self, run: TextRun) -> NodeKey {
        self.create(NodeKind::Text(run))
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.node(key).is_some()
    }

    pub fn kind(&self, key: NodeKey) -> Option<&NodeKind> {
        self.node(key).map(|n| &n.kind)
    }

    pub fn kind_mut(&mut self, key: NodeKey) -> Option<&mut NodeKind> {
        self.node_mut(key).map(|n| &mut n.kind)
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.node(key).and_then(|n| n.parent)
    }

    /// Children of `key`, empty for unknown keys.
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.node(key).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Position of `key` among its parent's children.
    pub fn index_in_parent(&self, key: NodeKey) -> Option<usize> {
        let parent = self.parent(key)?;
        self.children(parent).iter().position(|&c| c == key)
    }

    /// Iterate over the strict ancestors of `key`, nearest first.
    pub fn ancestors(&self, key: NodeKey) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.parent(key),
        }
    }

    pub fn is_descendant_of(&self, key: NodeKey, ancestor: NodeKey) -> bool {
        self.ancestors(key).any(|a| a == ancestor)
    }

    /// Nearest node, starting at `key` itself, whose kind satisfies `pred`.
    pub fn find_ancestor<F>(&self, key: NodeKey, pred: F) -> Option<NodeKey>
    where
        F: Fn(&NodeKind) -> bool,
    {
        if !self.contains(key) {
            return None;
        }
        std::iter::once(key)
            .chain(self.ancestors(key))
            .find(|&k| self.kind(k).map(&pred).unwrap_or(false))
    }

    /// The ancestor-or-self of `key` that is a direct child of the root.
    pub fn top_level_block(&self, key: NodeKey) -> Option<NodeKey> {
        if key == self.root {
            return None;
        }
        let mut current = key;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    /// All nodes of the subtree rooted at `key`, in document order.
    pub fn descendants(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if !self.contains(k) {
                continue;
            }
            out.push(k);
            stack.extend(self.children(k).iter().rev().copied());
        }
        out
    }

    /// Every table in the document, in document order.
    pub fn tables(&self) -> Vec<NodeKey> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&k| self.kind(k).map(NodeKind::is_table).unwrap_or(false))
            .collect()
    }

    /// Concatenated text of all runs below `key`.
    pub fn text_content(&self, key: NodeKey) -> String {
        let mut text = String::new();
        for k in self.descendants(key) {
            if let Some(NodeKind::Text(run)) = self.kind(k) {
                text.push_str(&run.text);
            }
        }
        text
    }

    /// The text runs directly under `key`.
    pub fn runs(&self, key: NodeKey) -> Vec<&TextRun> {
        self.children(key)
            .iter()
            .filter_map(|&c| match self.kind(c) {
                Some(NodeKind::Text(run)) => Some(run),
                _ => None,
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a detached node as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child)
    }

    /// Insert a detached node at `index` among `parent`'s children.
    pub fn insert_child(&mut self, parent: NodeKey, index: usize, child: NodeKey) -> Result<()> {
        self.check_attach(parent, child)?;
        let node = self.node_mut(parent).ok_or(Error::NodeNotFound(parent))?;
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Insert a detached node right after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeKey, node: NodeKey) -> Result<()> {
        let parent = self.parent(sibling).ok_or_else(|| {
            Error::InvalidStructure(format!("node {} has no parent", sibling))
        })?;
        let index = self.index_in_parent(sibling).unwrap_or(0);
        self.insert_child(parent, index + 1, node)
    }

    /// Detach `key` from its parent and free its whole subtree.
    pub fn remove(&mut self, key: NodeKey) -> Result<()> {
        if key == self.root {
            return Err(Error::InvalidStructure("the root cannot be removed".into()));
        }
        if !self.contains(key) {
            return Err(Error::NodeNotFound(key));
        }
        if let Some(parent) = self.parent(key) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != key);
            }
        }
        for k in self.descendants(key) {
            self.nodes[k.index()] = None;
        }
        let nodes = &self.nodes;
        self.elements
            .retain(|_, k| nodes.get(k.index()).map_or(false, Option::is_some));
        Ok(())
    }

    fn check_attach(&self, parent: NodeKey, child: NodeKey) -> Result<()> {
        let parent_kind = self.kind(parent).ok_or(Error::NodeNotFound(parent))?;
        if !self.contains(child) {
            return Err(Error::NodeNotFound(child));
        }
        if child == self.root || self.parent(child).is_some() {
            return Err(Error::InvalidStructure(format!(
                "node {} is already attached",
                child
            )));
        }
        if matches!(parent_kind, NodeKind::Text(_)) {
            return Err(Error::InvalidStructure("text runs cannot hold children".into()));
        }
        if parent == child || self.is_descendant_of(parent, child) {
            return Err(Error::InvalidStructure(format!(
                "attaching {} under {} would create a cycle",
                child, parent
            )));
        }
        let subtree_has_table = self
            .descendants(child)
            .iter()
            .any(|&k| self.kind(k).map(NodeKind::is_table).unwrap_or(false));
        let inside_table = self.find_ancestor(parent, NodeKind::is_table).is_some();
        if subtree_has_table && inside_table {
            return Err(Error::NestedTable);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendered Element Index
    // ─────────────────────────────────────────────────────────────────────────

    /// Record that `element` renders `key`.
    pub fn bind_element(&mut self, element: ElementId, key: NodeKey) -> Result<()> {
        if !self.contains(key) {
            return Err(Error::NodeNotFound(key));
        }
        self.elements.insert(element, key);
        Ok(())
    }

    pub fn unbind_element(&mut self, element: ElementId) {
        self.elements.remove(&element);
    }

    /// Resolve a rendered element back to its node.
    pub fn node_for_element(&self, element: ElementId) -> Result<NodeKey> {
        self.elements
            .get(&element)
            .copied()
            .filter(|&k| self.contains(k))
            .ok_or(Error::UnknownElement(element))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Check the table structure rules over the whole tree.
    pub fn validate(&self) -> Result<()> {
        for table in self.tables() {
            if self
                .ancestors(table)
                .any(|a| self.kind(a).map(NodeKind::is_table).unwrap_or(false))
            {
                return Err(Error::NestedTable);
            }
            let rows = self.children(table);
            if rows.is_empty() {
                return Err(Error::InvalidStructure(format!("table {} has no rows", table)));
            }
            let mut width = None;
            for &row in rows {
                if self.kind(row) != Some(&NodeKind::TableRow) {
                    return Err(Error::InvalidStructure(format!(
                        "table {} holds a {}",
                        table,
                        self.kind(row).map(NodeKind::name).unwrap_or("missing node")
                    )));
                }
                let cells = self.children(row);
                if *width.get_or_insert(cells.len()) != cells.len() {
                    return Err(Error::InvalidStructure(format!(
                        "table {} has rows of different widths",
                        table
                    )));
                }
                for &cell in cells {
                    self.validate_cell(cell)?;
                }
            }
        }
        Ok(())
    }

    fn validate_cell(&self, cell: NodeKey) -> Result<()> {
        if !self.kind(cell).map(NodeKind::is_table_cell).unwrap_or(false) {
            return Err(Error::InvalidStructure(format!("{} is not a table cell", cell)));
        }
        match self.children(cell) {
            [para] if self.kind(*para) == Some(&NodeKind::Paragraph) => {
                let all_text = self
                    .children(*para)
                    .iter()
                    .all(|&k| matches!(self.kind(k), Some(NodeKind::Text(_))));
                if all_text {
                    Ok(())
                } else {
                    Err(Error::InvalidStructure(format!(
                        "cell {} paragraph holds non-text nodes",
                        cell
                    )))
                }
            }
            _ => Err(Error::InvalidStructure(format!(
                "cell {} must hold exactly one paragraph",
                cell
            ))),
        }
    }

    fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key.index()).and_then(Option::as_mut)
    }
}

/// Iterator over a node's ancestors, nearest first.
pub struct Ancestors<'a> {
    tree: &'a DocumentTree,
    next: Option<NodeKey>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<NodeKey> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
