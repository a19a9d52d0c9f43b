//! Block-level markdown transformer
//!
//! The sync controller converts everything except tables through a
//! [`BlockTransformer`]. The default implementation pairs the comrak-based
//! parser with the tree serializer.

use crate::error::Result;
use crate::markdown::parser::{parse_markdown_with_options, MarkdownOptions};
use crate::markdown::serializer;
use crate::markdown::tree::{DocumentTree, NodeKey};

/// Converts markdown without tables into a document tree and back.
pub trait BlockTransformer {
    /// Parse markdown into a fresh tree.
    fn parse(&self, markdown: &str) -> Result<DocumentTree>;

    /// Serialize one top-level block of `tree`.
    fn serialize_block(&self, tree: &DocumentTree, node: NodeKey) -> String;
}

/// [`BlockTransformer`] backed by comrak.
#[derive(Debug, Clone, Default)]
pub struct ComrakTransformer {
    options: MarkdownOptions,
}

impl ComrakTransformer {
    pub fn new(options: MarkdownOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MarkdownOptions {
        &self.options
    }
}

impl BlockTransformer for ComrakTransformer {
    fn parse(&self, markdown: &str) -> Result<DocumentTree> {
        parse_markdown_with_options(markdown, &self.options)
    }

    fn serialize_block(&self, tree: &DocumentTree, node: NodeKey) -> String {
        serializer::serialize_block(tree, node)
    }
}
