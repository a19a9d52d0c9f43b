//! Inline run parsing and rendering
//!
//! Cell text is split into plain and inline-code runs. Only backtick spans
//! are recognized when parsing; other markdown emphasis inside a cell is
//! carried through as plain text. Rendering goes the other way for any run,
//! re-applying the markdown markers for its formatting flags.

use regex::Regex;
use std::sync::OnceLock;

use crate::markdown::tree::{FormatFlags, TextRun};

/// Matches a backtick-delimited code span with non-empty content.
fn code_span_regex() -> &'static Regex {
    static CODE_SPAN: OnceLock<Regex> = OnceLock::new();
    CODE_SPAN.get_or_init(|| Regex::new(r"`([^`]+)`").expect("code span pattern is valid"))
}

/// Split one cell's text into ordered runs.
///
/// Gaps between code spans become plain runs; empty gaps are skipped. Input
/// without any code span yields exactly one plain run, even when empty.
///
/// # Example
/// ```ignore
/// let runs = parse_inline("Use `useState` hook");
/// assert_eq!(runs.len(), 3);
/// assert!(runs[1].is_code());
/// ```
pub fn parse_inline(text: &str) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut cursor = 0;

    for caps in code_span_regex().captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if cursor < whole.start() {
            runs.push(TextRun::plain(&text[cursor..whole.start()]));
        }
        runs.push(TextRun::code(inner.as_str()));
        cursor = whole.end();
    }

    if cursor < text.len() {
        runs.push(TextRun::plain(&text[cursor..]));
    }

    if runs.is_empty() {
        runs.push(TextRun::plain(text));
    }

    runs
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

/// Render one run back to markdown, ignoring its link.
///
/// Code wins over every other flag: nothing is nested inside a code span.
pub fn render_run(run: &TextRun) -> String {
    if run.text.is_empty() {
        return String::new();
    }
    if run.is_code() {
        return format!("`{}`", run.text);
    }

    let mut result = run.text.clone();
    if run.format.contains(FormatFlags::STRIKETHROUGH) {
        result = format!("~~{}~~", result);
    }
    if run.format.contains(FormatFlags::BOLD | FormatFlags::ITALIC) {
        result = format!("***{}***", result);
    } else if run.format.contains(FormatFlags::BOLD) {
        result = format!("**{}**", result);
    } else if run.format.contains(FormatFlags::ITALIC) {
        result = format!("*{}*", result);
    }
    result
}

/// Render a sequence of runs, grouping consecutive runs that share a link
/// target into a single `[text](url)`.
pub fn render_runs<'a, I>(runs: I) -> String
where
    I: IntoIterator<Item = &'a TextRun>,
{
    render_runs_with(runs, |run, _| render_run(run))
}

/// [`render_runs`] with a custom per-run renderer.
///
/// The renderer is told whether the run starts a line of output. Runs inside
/// a link never do.
pub(crate) fn render_runs_with<'a, I, F>(runs: I, mut render: F) -> String
where
    I: IntoIterator<Item = &'a TextRun>,
    F: FnMut(&TextRun, bool) -> String,
{
    let mut output = String::new();
    let mut link: Option<(&str, String)> = None;

    for run in runs {
        let run_url = run.link_url.as_deref();
        let same_link = matches!((&link, run_url), (Some((url, _)), Some(u)) if *url == u);
        if same_link {
            if let Some((_, inner)) = link.as_mut() {
                inner.push_str(&render(run, false));
            }
            continue;
        }

        if let Some((url, inner)) = link.take() {
            output.push_str(&format!("[{}]({})", inner, url));
        }
        match run_url {
            Some(url) => link = Some((url, render(run, false))),
            None => {
                let line_start = output.is_empty() || output.ends_with('\n');
                output.push_str(&render(run, line_start));
            }
        }
    }

    if let Some((url, inner)) = link {
        output.push_str(&format!("[{}]({})", inner, url));
    }
    output
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(runs: &[TextRun]) -> Vec<&str> {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_plain_text_single_run() {
        let runs = parse_inline("hello world");
        assert_eq!(texts(&runs), vec!["hello world"]);
        assert!(!runs[0].is_code());
    }

    #[test]
    fn test_empty_input_yields_one_empty_run() {
        let runs = parse_inline("");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "");
        assert!(!runs[0].is_code());
    }

    #[test]
    fn test_single_code_span() {
        let runs = parse_inline("`code`");
        assert_eq!(texts(&runs), vec!["code"]);
        assert!(runs[0].is_code());
    }

    #[test]
    fn test_code_with_surrounding_text() {
        let runs = parse_inline("Use `useState` hook");
        assert_eq!(texts(&runs), vec!["Use ", "useState", " hook"]);
        assert!(!runs[0].is_code());
        assert!(runs[1].is_code());
        assert!(!runs[2].is_code());
    }

    #[test]
    fn test_multiple_code_spans() {
        let runs = parse_inline("`foo` and `bar`");
        assert_eq!(texts(&runs), vec!["foo", " and ", "bar"]);
        assert!(runs[0].is_code());
        assert!(runs[2].is_code());
    }

    #[test]
    fn test_adjacent_code_spans_have_no_empty_gap() {
        let runs = parse_inline("`a``b`");
        assert_eq!(texts(&runs), vec!["a", "b"]);
        assert!(runs.iter().all(TextRun::is_code));
    }

    #[test]
    fn test_unterminated_backtick_is_plain() {
        let runs = parse_inline("a `b");
        assert_eq!(texts(&runs), vec!["a `b"]);
        assert!(!runs[0].is_code());
    }

    #[test]
    fn test_empty_backticks_are_plain() {
        let runs = parse_inline("x `` y");
        assert_eq!(runs.len(), 1);
        assert!(!runs[0].is_code());
    }

    #[test]
    fn test_emphasis_passes_through_as_plain() {
        let runs = parse_inline("**bold** text");
        assert_eq!(texts(&runs), vec!["**bold** text"]);
    }

    #[test]
    fn test_multibyte_text_around_code() {
        let runs = parse_inline("på `kode` 中");
        assert_eq!(texts(&runs), vec!["på ", "kode", " 中"]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_code_ignores_other_flags() {
        let run = TextRun::plain("x").with_format(FormatFlags::CODE | FormatFlags::BOLD);
        assert_eq!(render_run(&run), "`x`");
    }

    #[test]
    fn test_render_emphasis_variants() {
        let bold = TextRun::plain("b").with_format(FormatFlags::BOLD);
        let italic = TextRun::plain("i").with_format(FormatFlags::ITALIC);
        let both = TextRun::plain("bi").with_format(FormatFlags::BOLD | FormatFlags::ITALIC);
        let strike = TextRun::plain("s").with_format(FormatFlags::STRIKETHROUGH | FormatFlags::BOLD);
        assert_eq!(render_run(&bold), "**b**");
        assert_eq!(render_run(&italic), "*i*");
        assert_eq!(render_run(&both), "***bi***");
        assert_eq!(render_run(&strike), "**~~s~~**");
    }

    #[test]
    fn test_render_empty_run_is_empty() {
        let run = TextRun::plain("").with_format(FormatFlags::BOLD);
        assert_eq!(render_run(&run), "");
    }

    #[test]
    fn test_render_runs_groups_links() {
        let runs = vec![
            TextRun::plain("see "),
            TextRun::plain("the ").with_link("https://x.dev"),
            TextRun::plain("docs")
                .with_format(FormatFlags::BOLD)
                .with_link("https://x.dev"),
            TextRun::plain("!"),
        ];
        assert_eq!(render_runs(&runs), "see [the **docs**](https://x.dev)!");
    }

    #[test]
    fn test_render_runs_round_trips_parsed_cell() {
        let runs = parse_inline("Use `a` and `b`");
        assert_eq!(render_runs(&runs), "Use `a` and `b`");
    }
}
