//! Markdown to ANSI-styled terminal text.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const ITALIC: &str = "\x1b[3m";
const UNDERLINE: &str = "\x1b[4m";
const STRIKE: &str = "\x1b[9m";
const CYAN: &str = "\x1b[36m";
const MAGENTA: &str = "\x1b[35m";

/// Renders a finished answer for a color terminal.
pub fn render_ansi(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH);
    let mut writer = AnsiWriter::default();
    for event in parser {
        writer.event(event);
    }
    writer.finish()
}

#[derive(Default)]
struct AnsiWriter {
    out: String,
    styles: Vec<&'static str>,
    /// Next number per open list; `None` for bullet lists.
    lists: Vec<Option<u64>>,
    links: Vec<String>,
    in_code_block: bool,
}

impl AnsiWriter {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) if self.in_code_block => {
                for line in text.split_inclusive('\n') {
                    self.out.push_str("    ");
                    self.out.push_str(line);
                }
            }
            Event::Text(text) => self.out.push_str(&text),
            Event::Code(code) => {
                self.out.push_str(CYAN);
                self.out.push_str(&code);
                self.restyle();
            }
            Event::SoftBreak | Event::HardBreak => {
                self.out.push('\n');
                self.indent_continuation();
            }
            Event::Rule => self.out.push_str("────────────────\n\n"),
            Event::Html(raw) | Event::InlineHtml(raw) => self.out.push_str(&raw),
            Event::TaskListMarker(done) => self.out.push_str(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                let style = if level == HeadingLevel::H1 { MAGENTA } else { BOLD };
                self.push_style(style);
                self.push_style(UNDERLINE);
            }
            Tag::Emphasis => self.push_style(ITALIC),
            Tag::Strong => self.push_style(BOLD),
            Tag::Strikethrough => self.push_style(STRIKE),
            Tag::CodeBlock(kind) => {
                if let CodeBlockKind::Fenced(lang) = &kind
                    && !lang.is_empty()
                {
                    self.out.push_str(DIM);
                    self.out.push_str(lang);
                    self.out.push_str(RESET);
                    self.out.push('\n');
                }
                self.in_code_block = true;
                self.push_style(CYAN);
            }
            Tag::List(start) => {
                if !self.lists.is_empty() && !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
                self.lists.push(start);
            }
            Tag::Item => {
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                match self.lists.last_mut() {
                    Some(Some(n)) => {
                        self.out.push_str(&format!("{n}. "));
                        *n += 1;
                    }
                    _ => self.out.push_str("• "),
                }
            }
            Tag::Link { dest_url, .. } => self.links.push(dest_url.into_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.pop_style();
                self.pop_style();
                self.out.push_str("\n\n");
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.pop_style();
                self.out.push('\n');
            }
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.out.push_str("\n\n");
                }
            }
            TagEnd::Item => {
                if !self.out.ends_with('\n') {
                    self.out.push('\n');
                }
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::Link => {
                if let Some(url) = self.links.pop() {
                    self.out.push_str(DIM);
                    self.out.push_str(&format!(" ({url})"));
                    self.restyle();
                }
            }
            _ => {}
        }
    }

    fn push_style(&mut self, style: &'static str) {
        self.styles.push(style);
        self.out.push_str(style);
    }

    fn pop_style(&mut self) {
        self.styles.pop();
        self.restyle();
    }

    /// Resets and re-applies whatever styles are still open.
    fn restyle(&mut self) {
        self.out.push_str(RESET);
        for style in &self.styles {
            self.out.push_str(style);
        }
    }

    fn indent_continuation(&mut self) {
        if !self.lists.is_empty() {
            self.out.push_str(&"  ".repeat(self.lists.len()));
        }
    }

    fn finish(mut self) -> String {
        if !self.styles.is_empty() {
            self.out.push_str(RESET);
        }
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        self.out
    }
}
