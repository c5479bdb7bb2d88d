//! Output rendering for chat turns.
//!
//! The session engine reports what it applies to the active message through a [`Renderer`];
//! the terminal front end prints it, tests and headless callers pass `()`.

use std::io::{self, Stdout, Write};

use crate::types::TokenUsage;

/// ANSI escape code for dim text (used for usage lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering a turn as it progresses.
///
/// Every method has a no-op default so partial renderers only implement what they show.
pub trait Renderer: Send {
    /// Print a fragment of response text.
    ///
    /// This is called incrementally as fragments are applied to the active message.
    fn print_text(&mut self, text: &str) {
        _ = text;
    }

    /// Print the terminal notice appended to a cancelled or failed turn.
    fn print_notice(&mut self, notice: &str) {
        _ = notice;
    }

    /// Print the token accounting of a completed turn.
    fn print_usage(&mut self, usage: &TokenUsage) {
        _ = usage;
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str) {
        _ = error;
    }

    /// Print an informational message.
    fn print_info(&mut self, info: &str) {
        _ = info;
    }

    /// Called once a turn has reached its terminal state.
    fn finish_response(&mut self) {}
}

impl Renderer for () {}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    line_start: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    fn write_line(&mut self, color: &str, text: &str) {
        if !self.line_start {
            self.write("\n");
        }
        if self.use_color {
            self.write(&format!("{color}{text}{ANSI_RESET}\n"));
        } else {
            self.write(&format!("{text}\n"));
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn print_notice(&mut self, notice: &str) {
        self.write_line(ANSI_YELLOW, notice);
    }

    fn print_usage(&mut self, usage: &TokenUsage) {
        self.write_line(ANSI_DIM, &format!("[{usage}]"));
    }

    fn print_error(&mut self, error: &str) {
        self.write_line(ANSI_RED, &format!("Error: {error}"));
    }

    fn print_info(&mut self, info: &str) {
        self.write_line("", info);
    }

    fn finish_response(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(renderer: PlainTextRenderer<Vec<u8>>) -> String {
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn notice_starts_on_its_own_line() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.print_text("Hel");
        renderer.print_notice("stopped");
        renderer.finish_response();
        assert_eq!(output(renderer), "Hel\nstopped\n");
    }

    #[test]
    fn finish_terminates_partial_line_once() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), false);
        renderer.print_text("Hello\n");
        renderer.finish_response();
        renderer.print_text("more");
        renderer.finish_response();
        assert_eq!(output(renderer), "Hello\nmore\n");
    }

    #[test]
    fn usage_is_styled_when_colored() {
        let mut renderer = PlainTextRenderer::with_writer(Vec::new(), true);
        renderer.print_usage(&TokenUsage::new(5, 1, 6));
        assert_eq!(
            output(renderer),
            format!("{ANSI_DIM}[5 prompt + 1 completion = 6 tokens]{ANSI_RESET}\n")
        );
    }
}
