//! Markdown parser implementation using comrak
//!
//! This module wraps comrak's parser and converts its AST into a
//! [`DocumentTree`]. Block structure maps onto the tree's node kinds; inline
//! emphasis, code, and links are flattened into formatted text runs.
//!
//! Tables are not handled here. comrak's table extension stays off because
//! table regions are parsed by the hand-written codec in
//! [`crate::markdown::table`].

use comrak::{
    nodes::{AstNode, ListType as ComrakListType, NodeValue},
    parse_document, Arena, Options,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::markdown::tree::{DocumentTree, FormatFlags, HeadingLevel, NodeKey, NodeKind, TextRun};

// ─────────────────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration options for markdown parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownOptions {
    /// Enable strikethrough syntax (~~text~~)
    pub strikethrough: bool,
    /// Enable autolink URLs and emails
    pub autolink: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            strikethrough: true,
            autolink: true,
        }
    }
}

impl MarkdownOptions {
    /// Convert to comrak Options.
    fn to_comrak_options(&self) -> Options {
        let mut options = Options::default();
        options.extension.strikethrough = self.strikethrough;
        options.extension.autolink = self.autolink;
        options.extension.table = false;
        options
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Parse markdown text into a document tree with default options.
///
/// # Example
/// ```ignore
/// let tree = parse_markdown("# Hello\n\nWorld")?;
/// assert_eq!(tree.children(tree.root()).len(), 2);
/// ```
pub fn parse_markdown(markdown: &str) -> Result<DocumentTree> {
    parse_markdown_with_options(markdown, &MarkdownOptions::default())
}

/// Parse markdown text with custom options.
pub fn parse_markdown_with_options(
    markdown: &str,
    options: &MarkdownOptions,
) -> Result<DocumentTree> {
    let arena = Arena::new();
    let comrak_options = options.to_comrak_options();
    let root = parse_document(&arena, markdown, &comrak_options);

    let mut tree = DocumentTree::new();
    let tree_root = tree.root();
    for child in root.children() {
        convert_block(child, &mut tree, tree_root)?;
    }
    Ok(tree)
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal Conversion Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Convert a comrak block node and attach it under `parent`.
fn convert_block<'a>(node: &'a AstNode<'a>, tree: &mut DocumentTree, parent: NodeKey) -> Result<()> {
    let value = node.data.borrow().value.clone();

    let key = match value {
        NodeValue::Heading(heading) => {
            let key = tree.create(NodeKind::Heading {
                level: HeadingLevel::from(heading.level),
            });
            convert_inlines(node, tree, key, FormatFlags::empty(), None)?;
            key
        }
        NodeValue::Paragraph => {
            let key = tree.create(NodeKind::Paragraph);
            convert_inlines(node, tree, key, FormatFlags::empty(), None)?;
            key
        }
        NodeValue::BlockQuote => {
            let key = tree.create(NodeKind::Quote);
            convert_children(node, tree, key)?;
            key
        }
        NodeValue::List(list) => {
            let ordered = matches!(list.list_type, ComrakListType::Ordered);
            let key = tree.create(NodeKind::List {
                ordered,
                start: if ordered { list.start } else { 1 },
            });
            convert_children(node, tree, key)?;
            key
        }
        NodeValue::Item(_) => {
            let key = tree.create(NodeKind::ListItem);
            convert_children(node, tree, key)?;
            key
        }
        NodeValue::CodeBlock(code) => {
            let language = code.info.split_whitespace().next().unwrap_or("").to_string();
            let key = tree.create(NodeKind::CodeBlock { language });
            let literal = code.literal.strip_suffix('\n').unwrap_or(&code.literal);
            let run = tree.create_text(TextRun::plain(literal));
            tree.append_child(key, run)?;
            key
        }
        NodeValue::ThematicBreak => tree.create(NodeKind::ThematicBreak),
        NodeValue::HtmlBlock(html) => {
            // Raw HTML (and the table placeholder comment) is kept verbatim.
            let key = tree.create(NodeKind::Paragraph);
            let run = tree.create_text(
                TextRun::plain(html.literal.trim_end_matches('\n')).with_format(FormatFlags::RAW),
            );
            tree.append_child(key, run)?;
            key
        }
        // Anything else becomes a paragraph of its inline content
        _ => {
            let key = tree.create(NodeKind::Paragraph);
            convert_inlines(node, tree, key, FormatFlags::empty(), None)?;
            key
        }
    };

    tree.append_child(parent, key)
}

fn convert_children<'a>(node: &'a AstNode<'a>, tree: &mut DocumentTree, parent: NodeKey) -> Result<()> {
    for child in node.children() {
        convert_block(child, tree, parent)?;
    }
    Ok(())
}

/// Flatten the inline children of `node` into runs under `parent`.
fn convert_inlines<'a>(
    node: &'a AstNode<'a>,
    tree: &mut DocumentTree,
    parent: NodeKey,
    format: FormatFlags,
    link: Option<&str>,
) -> Result<()> {
    for child in node.children() {
        let value = child.data.borrow().value.clone();
        match value {
            NodeValue::Text(text) => push_run(tree, parent, text, format, link)?,
            NodeValue::Code(code) => {
                push_run(tree, parent, code.literal, format | FormatFlags::CODE, link)?
            }
            NodeValue::SoftBreak | NodeValue::LineBreak => {
                push_run(tree, parent, "\n".to_string(), format, link)?
            }
            NodeValue::HtmlInline(html) => {
                push_run(tree, parent, html, format | FormatFlags::RAW, link)?
            }
            NodeValue::Emph => {
                convert_inlines(child, tree, parent, format | FormatFlags::ITALIC, link)?
            }
            NodeValue::Strong => {
                convert_inlines(child, tree, parent, format | FormatFlags::BOLD, link)?
            }
            NodeValue::Strikethrough => convert_inlines(
                child,
                tree,
                parent,
                format | FormatFlags::STRIKETHROUGH,
                link,
            )?,
            NodeValue::Link(node_link) => {
                convert_inlines(child, tree, parent, format, Some(&node_link.url))?
            }
            NodeValue::Image(image) => {
                let alt = collect_text(child);
                let source = format!("![{}]({})", alt, image.url);
                push_run(tree, parent, source, format | FormatFlags::RAW, link)?
            }
            _ => convert_inlines(child, tree, parent, format, link)?,
        }
    }
    Ok(())
}

fn push_run(
    tree: &mut DocumentTree,
    parent: NodeKey,
    text: String,
    format: FormatFlags,
    link: Option<&str>,
) -> Result<()> {
    // comrak splits text at escapes and entities; keep one run per span
    let mergeable = !format.intersects(FormatFlags::CODE | FormatFlags::RAW) && text != "\n";
    let last = tree.children(parent).last().copied();
    if let (true, Some(last)) = (mergeable, last) {
        if let Some(NodeKind::Text(prev)) = tree.kind_mut(last) {
            if prev.format == format && prev.link_url.as_deref() == link && prev.text != "\n" {
                prev.text.push_str(&text);
                return Ok(());
            }
        }
    }

    let run = TextRun {
        text,
        format,
        link_url: link.map(str::to_string),
    };
    let key = tree.create_text(run);
    tree.append_child(parent, key)
}

/// Plain text of a comrak subtree.
fn collect_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut output = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(t) => output.push_str(t),
            NodeValue::Code(c) => output.push_str(&c.literal),
            _ => output.push_str(&collect_text(child)),
        }
    }
    output
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
