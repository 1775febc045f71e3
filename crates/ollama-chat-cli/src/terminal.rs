use std::io::Write;

use ollama_chat_core::{MarkdownFormatter, MessageFormatter as _, Renderer, StreamFailure};

use crate::cli::OutputMode;
use crate::markdown::render_ansi;

const THINKING: &str = "Thinking...";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Prints one answer to a terminal.
///
/// `Plain` writes each new piece of text as it arrives. The formatted
/// modes show a placeholder while streaming and print the whole answer
/// once the final update lands. Failures go to the error writer; text
/// received before the failure is kept on screen.
pub struct TerminalRenderer<W: Write, E: Write> {
    out: W,
    err: E,
    mode: OutputMode,
    /// Bytes of the accumulated text already written in `Plain` mode.
    printed: usize,
    thinking: bool,
}

impl TerminalRenderer<std::io::Stdout, std::io::Stderr> {
    pub fn stdio(mode: OutputMode) -> Self {
        Self::new(std::io::stdout(), std::io::stderr(), mode)
    }
}

impl<W: Write, E: Write> TerminalRenderer<W, E> {
    pub fn new(out: W, err: E, mode: OutputMode) -> Self {
        Self {
            out,
            err,
            mode,
            printed: 0,
            thinking: false,
        }
    }

    /// Resets per-answer state so the renderer can be reused for the next turn.
    pub fn reset(&mut self) {
        self.printed = 0;
        self.thinking = false;
    }

    #[cfg(test)]
    fn into_parts(self) -> (W, E) {
        (self.out, self.err)
    }

    fn write_delta(&mut self, full_text: &str) {
        match full_text.get(self.printed..) {
            Some(delta) if !delta.is_empty() => {
                let _ = self.out.write_all(delta.as_bytes());
                self.printed = full_text.len();
            }
            Some(_) => {}
            None => {
                // Text no longer extends what was printed; start over on a new line.
                let _ = writeln!(self.out);
                let _ = self.out.write_all(full_text.as_bytes());
                self.printed = full_text.len();
            }
        }
        let _ = self.out.flush();
    }

    fn show_thinking(&mut self) {
        if !self.thinking {
            self.thinking = true;
            let _ = write!(self.out, "{THINKING}");
            let _ = self.out.flush();
        }
    }

    fn clear_thinking(&mut self) {
        if self.thinking {
            self.thinking = false;
            let _ = write!(self.out, "{CLEAR_LINE}");
        }
    }

    fn formatted(&self, text: &str) -> String {
        match self.mode {
            OutputMode::Plain => text.to_string(),
            OutputMode::Ansi => render_ansi(text),
            OutputMode::Html => MarkdownFormatter.format(text),
        }
    }
}

impl<W: Write, E: Write> Renderer for TerminalRenderer<W, E> {
    fn on_update(&mut self, full_text: &str, is_final: bool) {
        match (self.mode, is_final) {
            (OutputMode::Plain, false) => self.write_delta(full_text),
            (OutputMode::Plain, true) => {
                self.write_delta(full_text);
                let _ = writeln!(self.out);
            }
            (_, false) => self.show_thinking(),
            (_, true) => {
                self.clear_thinking();
                let rendered = self.formatted(full_text);
                let _ = writeln!(self.out, "{}", rendered.trim_end());
            }
        }
        let _ = self.out.flush();
    }

    /// Prints a one-line notice on stderr that scrolls away with the chat;
    /// partial text stays on stdout.
    fn on_error(&mut self, failure: &StreamFailure, partial_text: &str) {
        match self.mode {
            OutputMode::Plain => {
                if self.printed > 0 {
                    let _ = writeln!(self.out);
                }
            }
            _ => {
                self.clear_thinking();
                if !partial_text.is_empty() {
                    let _ = writeln!(self.out, "{partial_text}");
                }
            }
        }
        let _ = self.out.flush();

        let notice = match failure {
            StreamFailure::Cancelled => "stopped".to_string(),
            other => format!("error: {other}"),
        };
        if partial_text.is_empty() {
            let _ = writeln!(self.err, "⚠ {notice}");
        } else {
            let _ = writeln!(self.err, "⚠ {notice} (answer incomplete)");
        }
        let _ = self.err.flush();
    }
}
