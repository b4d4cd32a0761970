//! Output rendering for the chat application.
//!
//! This module provides a trait-based rendering abstraction so a chat session never writes to
//! the console directly.  The default implementation writes plain text with optional ANSI
//! styling.

use std::io::{self, Write};

/// ANSI escape code for dim text (used for informational output).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the reply label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Capturing output in tests
pub trait Renderer: Send {
    /// Called before the first piece of a reply is printed.
    fn start_response(&mut self);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as fragments are streamed from the API, and once with the
    /// whole reply otherwise.
    fn print_text(&mut self, text: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    in_response: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer on stdout with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a new PlainTextRenderer that writes to `out`.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            in_response: false,
        }
    }

    /// Flushes output to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn end_response_line(&mut self) {
        if self.in_response {
            let _ = writeln!(self.out);
            self.in_response = false;
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        if self.use_color {
            let _ = write!(self.out, "{ANSI_CYAN}AI:{ANSI_RESET} ");
        } else {
            let _ = write!(self.out, "AI: ");
        }
        self.in_response = true;
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_response_line();
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "Error: {error}");
        }
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.end_response_line();
        if self.use_color {
            let _ = writeln!(self.out, "{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.out, "{info}");
        }
        self.flush();
    }

    fn finish_response(&mut self) {
        self.end_response_line();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.end_response_line();
        let _ = writeln!(self.out, "[interrupted]");
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
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
    fn streamed_reply_is_written_in_order() {
        let buffer = SharedBuffer::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(buffer.clone()), false);
        renderer.start_response();
        renderer.print_text("Hel");
        renderer.print_text("lo");
        renderer.finish_response();
        assert_eq!(buffer.contents(), "AI: Hello\n");
    }

    #[test]
    fn error_mid_response_starts_a_new_line() {
        let buffer = SharedBuffer::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(buffer.clone()), false);
        renderer.start_response();
        renderer.print_text("par");
        renderer.print_error("HTTP 500: boom");
        renderer.print_info("ok");
        assert_eq!(buffer.contents(), "AI: par\nError: HTTP 500: boom\nok\n");
    }

    #[test]
    fn interruption_is_marked() {
        let buffer = SharedBuffer::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(buffer.clone()), true);
        renderer.start_response();
        renderer.print_text("x");
        renderer.print_interrupted();
        let contents = buffer.contents();
        assert!(contents.ends_with("x\n[interrupted]\n"));
        assert!(contents.contains(ANSI_CYAN));
    }
}
