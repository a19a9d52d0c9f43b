//! Document tree to markdown serializer
//!
//! Converts the blocks of a [`DocumentTree`] back into markdown text. Tables
//! go through the table codec and top-level blocks are separated by one blank
//! line.
//!
//! Plain text is escaped so it reads back as the same text: a literal `*`
//! stays a star and a line reading `1986. A year` does not become a list.
//! Raw runs (HTML, images) are written verbatim.

use crate::markdown::inline::{render_run, render_runs_with};
use crate::markdown::table::serialize_table;
use crate::markdown::tree::{DocumentTree, NodeKey, NodeKind, TextRun};

/// Serialize every top-level block of `tree`, joined by blank lines.
///
/// # Example
/// ```ignore
/// let tree = parse_markdown("# Title\n\nBody")?;
/// assert_eq!(serialize_document(&tree), "# Title\n\nBody");
/// ```
pub fn serialize_document(tree: &DocumentTree) -> String {
    join_blocks(tree, tree.children(tree.root()))
}

/// Serialize a single block node (and everything below it).
pub fn serialize_block(tree: &DocumentTree, node: NodeKey) -> String {
    let Some(kind) = tree.kind(node) else {
        return String::new();
    };

    match kind {
        NodeKind::Root => serialize_document(tree),
        NodeKind::Heading { level } => {
            let hashes = "#".repeat(level.as_u8() as usize);
            let text = render_runs_with(tree.runs(node), |run, _| render_block_run(run, false));
            if text.is_empty() {
                hashes
            } else {
                format!("{} {}", hashes, text)
            }
        }
        NodeKind::Paragraph => render_runs_with(tree.runs(node), render_block_run),
        NodeKind::Quote => {
            let inner = join_blocks(tree, tree.children(node));
            inner
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        NodeKind::List { ordered, start } => {
            serialize_list(tree, node, ordered.then_some(*start))
        }
        NodeKind::ListItem => join_item_blocks(tree, node),
        NodeKind::CodeBlock { language } => {
            let literal = tree.text_content(node);
            let fence = "`".repeat(longest_backtick_run(&literal).max(2) + 1);
            format!("{fence}{language}\n{literal}\n{fence}")
        }
        NodeKind::ThematicBreak => "---".to_string(),
        NodeKind::Table => serialize_table(tree, node).unwrap_or_default(),
        NodeKind::TableRow | NodeKind::TableCell { .. } => tree.text_content(node),
        NodeKind::Text(run) => render_block_run(run, false),
    }
}

fn join_blocks(tree: &DocumentTree, blocks: &[NodeKey]) -> String {
    blocks
        .iter()
        .map(|&block| serialize_block(tree, block))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Item content: a paragraph followed by a paragraph or a nested list stays
/// tight, other blocks are spaced.
fn join_item_blocks(tree: &DocumentTree, item: NodeKey) -> String {
    let mut output = String::new();
    let mut prev_was_paragraph = false;
    for &child in tree.children(item) {
        let kind = tree.kind(child);
        let is_paragraph = kind == Some(&NodeKind::Paragraph);
        let tight = matches!(kind, Some(NodeKind::Paragraph | NodeKind::List { .. }));
        if !output.is_empty() {
            output.push_str(if tight && prev_was_paragraph {
                "\n"
            } else {
                "\n\n"
            });
        }
        output.push_str(&serialize_block(tree, child));
        prev_was_paragraph = is_paragraph;
    }
    output
}

/// `start` is the first item number of an ordered list.
fn serialize_list(tree: &DocumentTree, list: NodeKey, start: Option<usize>) -> String {
    let mut items = Vec::new();
    for (index, &item) in tree.children(list).iter().enumerate() {
        let marker = match start {
            Some(start) => format!("{}. ", start + index),
            None => "- ".to_string(),
        };
        let indent = " ".repeat(marker.len());
        let content = join_item_blocks(tree, item);

        let mut lines = content.lines();
        let mut rendered = format!("{}{}", marker, lines.next().unwrap_or(""));
        for line in lines {
            rendered.push('\n');
            if !line.is_empty() {
                rendered.push_str(&indent);
                rendered.push_str(line);
            }
        }
        items.push(rendered);
    }
    items.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Inline Text
// ─────────────────────────────────────────────────────────────────────────────

/// Render one run of a paragraph or heading.
fn render_block_run(run: &TextRun, line_start: bool) -> String {
    if run.text.is_empty() {
        return String::new();
    }
    if run.is_raw() {
        return run.text.clone();
    }
    if run.is_code() {
        return code_span(&run.text);
    }
    // Soft breaks carry the surrounding emphasis but take no markers
    if run.text == "\n" {
        return run.text.clone();
    }

    let escaped = TextRun {
        text: escape_text(&run.text, line_start && run.format.is_empty()),
        format: run.format,
        link_url: None,
    };
    render_run(&escaped)
}

/// A code span whose fence is longer than any backtick run inside it.
fn code_span(text: &str) -> String {
    let ticks = "`".repeat(longest_backtick_run(text) + 1);
    let padded = text.starts_with('`')
        || text.ends_with('`')
        || (text.starts_with(' ') && text.ends_with(' ') && !text.trim().is_empty());
    if padded {
        format!("{ticks} {text} {ticks}")
    } else {
        format!("{ticks}{text}{ticks}")
    }
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

/// Backslash-escape markdown syntax in literal text.
///
/// `line_start` says whether the text begins a line of output; every line
/// after a newline inside the text does.
fn escape_text(text: &str, line_start: bool) -> String {
    let mut output = String::with_capacity(text.len() + 8);
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let rest = if line_start || index > 0 {
            escape_block_marker(line, &mut output)
        } else {
            line
        };
        escape_inline(rest, &mut output);
    }
    output
}

/// Escape a heading, list, quote, or setext marker opening `line`. Returns
/// the part of the line still to be written.
fn escape_block_marker<'a>(line: &'a str, output: &mut String) -> &'a str {
    let body = line.trim_start_matches(|c: char| c == ' ' || c == '\t');
    output.push_str(&line[..line.len() - body.len()]);

    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=9).contains(&digits) {
        let after = &body[digits..];
        if let Some(delimiter @ ('.' | ')')) = after.chars().next() {
            let tail = &after[1..];
            if tail.is_empty() || tail.starts_with(|c: char| c == ' ' || c == '\t') {
                output.push_str(&body[..digits]);
                output.push('\\');
                output.push(delimiter);
                return tail;
            }
        }
    }

    match body.chars().next() {
        Some(marker @ ('#' | '-' | '+' | '>' | '=')) => {
            output.push('\\');
            output.push(marker);
            &body[1..]
        }
        _ => body,
    }
}

fn escape_inline(text: &str, output: &mut String) {
    for (index, c) in text.char_indices() {
        let next = text[index + c.len_utf8()..].chars().next();
        let escape = match c {
            '*' | '_' | '`' | '[' | '|' | '~' => true,
            '\\' => next.map_or(true, |n| n.is_ascii_punctuation()),
            '<' => next.map_or(false, |n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')),
            '&' => next.map_or(false, |n| n.is_ascii_alphanumeric() || n == '#'),
            _ => false,
        };
        if escape {
            output.push('\\');
        }
        output.push(c);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parser::parse_markdown;

    fn round_trip(markdown: &str) -> String {
        let tree = parse_markdown(markdown).unwrap();
        serialize_document(&tree)
    }

    #[test]
    fn test_serialize_heading_and_paragraph() {
        assert_eq!(round_trip("# Title\n\nBody text"), "# Title\n\nBody text");
        assert_eq!(round_trip("### Deep"), "### Deep");
    }

    #[test]
    fn test_serialize_empty_heading() {
        let mut tree = DocumentTree::new();
        let root = tree.root();
        let heading = tree.create(NodeKind::Heading {
            level: crate::markdown::tree::HeadingLevel::H1,
        });
        tree.append_child(root, heading).unwrap();
        assert_eq!(serialize_document(&tree), "#");
    }

    #[test]
    fn test_serialize_inline_formatting() {
        assert_eq!(
            round_trip("Some **bold**, *italic* and `code` with ~~strike~~"),
            "Some **bold**, *italic* and `code` with ~~strike~~"
        );
    }

    #[test]
    fn test_serialize_link() {
        assert_eq!(
            round_trip("See [docs](https://example.com) now"),
            "See [docs](https://example.com) now"
        );
    }

    #[test]
    fn test_serialize_lists() {
        assert_eq!(round_trip("- a\n- b\n- c"), "- a\n- b\n- c");
        assert_eq!(round_trip("1. one\n2. two"), "1. one\n2. two");
    }

    #[test]
    fn test_serialize_nested_list_is_indented() {
        assert_eq!(round_trip("- a\n  - b"), "- a\n  - b");
        let reparsed = parse_markdown(&round_trip("- a\n  - b")).unwrap();
        let list = reparsed.children(reparsed.root())[0];
        assert_eq!(reparsed.children(list).len(), 1);
    }

    #[test]
    fn test_serialize_quote() {
        assert_eq!(round_trip("> quoted\n>\n> more"), "> quoted\n>\n> more");
    }

    #[test]
    fn test_serialize_code_block() {
        assert_eq!(
            round_trip("```rust\nfn main() {}\n```"),
            "```rust\nfn main() {}\n```"
        );
    }

    #[test]
    fn test_code_fence_outgrows_inner_fences() {
        let source = "````\n```\ninner\n```\n````";
        assert_eq!(round_trip(source), source);

        let reparsed = parse_markdown(&round_trip(source)).unwrap();
        let blocks = reparsed.children(reparsed.root());
        assert_eq!(blocks.len(), 1);
        assert_eq!(reparsed.text_content(blocks[0]), "```\ninner\n```");
    }

    #[test]
    fn test_code_span_with_backticks() {
        assert_eq!(round_trip("Run ``a ` b`` now"), "Run ``a ` b`` now");
        assert_eq!(round_trip("`` `tick` ``"), "`` `tick` ``");
    }

    #[test]
    fn test_ordered_list_keeps_start_number() {
        assert_eq!(round_trip("3. three\n4. four"), "3. three\n4. four");
        assert_eq!(round_trip("9. nine\n10. ten"), "9. nine\n10. ten");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Escaping Tests
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize, parse again, and return the text of the first block.
    fn reparsed_text(markdown: &str) -> (String, NodeKind) {
        let tree = parse_markdown(&round_trip(markdown)).unwrap();
        let block = tree.children(tree.root())[0];
        (tree.text_content(block), tree.kind(block).cloned().unwrap())
    }

    #[test]
    fn test_escaped_emphasis_stays_literal() {
        assert_eq!(round_trip("\\*not emphasis\\*"), "\\*not emphasis\\*");
        let (text, kind) = reparsed_text("\\*not emphasis\\*");
        assert_eq!(text, "*not emphasis*");
        assert_eq!(kind, NodeKind::Paragraph);
    }

    #[test]
    fn test_number_at_line_start_is_not_a_list() {
        assert_eq!(round_trip("1986\\. A great year"), "1986\\. A great year");
        let (text, kind) = reparsed_text("1986\\. A great year");
        assert_eq!(text, "1986. A great year");
        assert_eq!(kind, NodeKind::Paragraph);
    }

    #[test]
    fn test_block_markers_at_line_start_are_escaped() {
        for source in ["\\# not a heading", "\\- not a list", "\\+ plus", "\\> not a quote"] {
            let (text, kind) = reparsed_text(source);
            assert_eq!(kind, NodeKind::Paragraph, "{}", source);
            assert_eq!(text, &source[1..]);
        }
    }

    #[test]
    fn test_marker_after_soft_break_is_escaped() {
        let source = "first line\n\\- second line";
        assert_eq!(round_trip(source), source);
        let tree = parse_markdown(&round_trip(source)).unwrap();
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn test_inline_punctuation_is_escaped() {
        let source = "snake\\_case, \\[not a link\\] and a \\| pipe";
        let (text, _) = reparsed_text(source);
        assert_eq!(text, "snake_case, [not a link] and a | pipe");
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let source = "Version 3.14 costs $5 - a bargain (really)!";
        assert_eq!(round_trip(source), source);
    }

    #[test]
    fn test_html_and_images_are_written_verbatim() {
        assert_eq!(
            round_trip("An ![icon](img.png) and <b>bold</b> here"),
            "An ![icon](img.png) and <b>bold</b> here"
        );
        assert_eq!(round_trip("<div>\n*raw*\n</div>"), "<div>\n*raw*\n</div>");
    }

    #[test]
    fn test_serialize_thematic_break() {
        assert_eq!(round_trip("a\n\n---\n\nb"), "a\n\n---\n\nb");
    }

    #[test]
    fn test_serialize_soft_break() {
        assert_eq!(round_trip("line one\nline two"), "line one\nline two");
    }

    #[test]
    fn test_serialize_missing_node_is_empty() {
        let tree = DocumentTree::new();
        assert_eq!(serialize_block(&tree, NodeKey::from_raw(42)), "");
    }
}
