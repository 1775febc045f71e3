//! Formatting of a finished answer.
//!
//! Runs on the final update only; incremental updates are shown as plain text.

use once_cell::sync::Lazy;
use regex::Regex;

/// Converts a finished answer into display markup.
pub trait MessageFormatter: Send + Sync {
    fn format(&self, content: &str) -> String;
}

/// Markdown to HTML using pulldown-cmark.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownFormatter;

impl MessageFormatter for MarkdownFormatter {
    fn format(&self, content: &str) -> String {
        use pulldown_cmark::{Options, Parser, html};
        if content.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        let parser = Parser::new_ext(content, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH);
        html::push_html(&mut out, parser);
        out
    }
}

static INLINE_CODE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"`([^`]+)`").ok());
static STRONG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").ok());
static EMPHASIS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").ok());

/// Minimal inline markup when no markdown renderer is wanted.
///
/// Handles line breaks, inline code, `**strong**` and `*em*`. Input is
/// HTML-escaped first.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicFormatter;

impl MessageFormatter for BasicFormatter {
    fn format(&self, content: &str) -> String {
        if content.is_empty() {
            return String::new();
        }
        let mut out = escape_html(content).replace('\n', "<br>");
        for (pattern, replacement) in [
            (&*INLINE_CODE, "<code>$1</code>"),
            (&*STRONG, "<strong>$1</strong>"),
            (&*EMPHASIS, "<em>$1</em>"),
        ] {
            if let Some(re) = pattern {
                out = re.replace_all(&out, replacement).into_owned();
            }
        }
        out
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_formatter_renders_code_blocks() {
        let html = MarkdownFormatter.format("# Title\n\n```rust\nfn main() {}\n```\n");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<pre><code class=\"language-rust\">"));
    }

    #[test]
    fn empty_content_formats_to_empty_string() {
        assert_eq!(MarkdownFormatter.format(""), "");
        assert_eq!(BasicFormatter.format(""), "");
    }

    #[test]
    fn basic_formatter_handles_inline_markup() {
        assert_eq!(
            BasicFormatter.format("use `cargo`\n**bold** and *soft*"),
            "use <code>cargo</code><br><strong>bold</strong> and <em>soft</em>"
        );
    }

    #[test]
    fn basic_formatter_escapes_html() {
        assert_eq!(BasicFormatter.format("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
