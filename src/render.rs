//! Output sinks for chat sessions.
//!
//! A [`Renderer`] is where a session writes everything it produces: streamed
//! response fragments, command output, and errors.  The terminal uses
//! [`PlainTextRenderer`]; a remote exchange uses [`ChannelRenderer`], which
//! forwards text to the task that owns the connection.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

/// ANSI escape code for bright cyan text (used for the conversation log).
const ANSI_BRIGHT_CYAN: &str = "\x1b[96m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// Trait for rendering session output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Forwarding to a remote caller
pub trait Renderer: Send {
    /// Print a chunk of response text.
    ///
    /// This is called incrementally as fragments are streamed from the API,
    /// and must make the text visible immediately rather than buffering it.
    fn print_text(&mut self, text: &str);

    /// Called when a response is complete.
    ///
    /// Writes the single trailing newline that marks the end of a response.
    fn finish_response(&mut self);

    /// Print an informational message on its own line.
    fn print_info(&mut self, info: &str);

    /// Print a block of text that should stand out (the conversation log).
    fn print_highlighted(&mut self, text: &str) {
        self.print_info(text);
    }

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }

    /// Resets any pending interrupt before the next turn.
    fn clear_interrupt(&mut self) {}

    /// Marks whether a turn is being worked on.
    fn set_busy(&mut self, _busy: bool) {}
}

/// Decides what an interrupt or termination signal means.
///
/// While the terminal's turn is busy a signal interrupts the stream; while
/// it is idle the signal shuts the session down.
#[derive(Debug, Clone)]
pub struct SignalSwitch {
    interrupted: Arc<AtomicBool>,
    busy: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl SignalSwitch {
    /// Creates a switch that cancels `shutdown` when tripped while idle.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            interrupted: Arc::new(AtomicBool::new(false)),
            busy: Arc::new(AtomicBool::new(false)),
            shutdown,
        }
    }

    /// Handles one signal.  Returns true when it shut the session down.
    pub fn trip(&self) -> bool {
        if self.busy.load(Ordering::SeqCst) {
            self.interrupted.store(true, Ordering::SeqCst);
            false
        } else {
            self.shutdown.cancel();
            true
        }
    }

    /// True while a turn is in progress.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer writes directly to stdout and flushes after every
/// fragment so output appears as it streams.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    interrupted: Option<Arc<AtomicBool>>,
    busy: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            interrupted: None,
            busy: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Wires the renderer to a signal switch: it reports when a turn is busy
    /// and stops streaming when the switch trips.
    pub fn with_signals(mut self, switch: &SignalSwitch) -> Self {
        self.interrupted = Some(switch.interrupted.clone());
        self.busy = Some(switch.busy.clone());
        self
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn print_text(&mut self, text: &str) {
        let _ = self.stdout.write_all(text.as_bytes());
        self.flush();
    }

    fn finish_response(&mut self) {
        let _ = self.stdout.write_all(b"\n");
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        let _ = writeln!(self.stdout, "{info}");
        self.flush();
    }

    fn print_highlighted(&mut self, text: &str) {
        if self.use_color {
            let _ = writeln!(self.stdout, "{ANSI_BRIGHT_CYAN}{text}{ANSI_RESET}");
        } else {
            let _ = writeln!(self.stdout, "{text}");
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.flush();
        eprintln!("\nError: {error}");
    }

    fn print_interrupted(&mut self) {
        let _ = self.stdout.write_all(b"\n[interrupted]\n");
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn clear_interrupt(&mut self) {
        if let Some(flag) = &self.interrupted {
            flag.store(false, Ordering::Relaxed);
        }
    }

    fn set_busy(&mut self, busy: bool) {
        if let Some(flag) = &self.busy {
            flag.store(busy, Ordering::SeqCst);
        }
    }
}

/// Renderer that forwards everything to a channel.
///
/// The receiving end is drained by whichever task owns the remote
/// connection.  Sends to a receiver that has gone away are dropped; the
/// exchange still runs to completion so the transcript stays consistent.
#[derive(Debug, Clone)]
pub struct ChannelRenderer {
    tx: UnboundedSender<String>,
}

impl ChannelRenderer {
    /// Creates a renderer that sends its output to `tx`.
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }

    fn send(&self, text: impl Into<String>) {
        if self.tx.send(text.into()).is_err() {
            tracing::debug!("remote receiver went away; dropping output");
        }
    }
}

impl Renderer for ChannelRenderer {
    fn print_text(&mut self, text: &str) {
        self.send(text);
    }

    fn finish_response(&mut self) {
        self.send("\n");
    }

    fn print_info(&mut self, info: &str) {
        self.send(format!("{info}\n"));
    }

    fn print_error(&mut self, error: &str) {
        self.send(format!("\nError: {error}\n"));
    }

    fn print_interrupted(&mut self) {
        self.send("\n[interrupted]\n");
    }
}

/// Renderer that collects everything in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferRenderer {
    output: String,
    errors: Vec<String>,
    interrupt: bool,
}

impl BufferRenderer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a buffer that asks every stream to stop.
    pub fn interrupting() -> Self {
        Self {
            interrupt: true,
            ..Self::default()
        }
    }

    /// Everything written so far except errors.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Errors written so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Returns the output and clears the buffer.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.output)
    }
}

impl Renderer for BufferRenderer {
    fn print_text(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn finish_response(&mut self) {
        self.output.push('\n');
    }

    fn print_info(&mut self, info: &str) {
        self.output.push_str(info);
        self.output.push('\n');
    }

    fn print_error(&mut self, error: &str) {
        self.errors.push(error.to_string());
    }

    fn print_interrupted(&mut self) {
        self.output.push_str("[interrupted]\n");
    }

    fn should_interrupt(&self) -> bool {
        self.interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert!(!renderer.should_interrupt());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn renderer_interrupt_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let renderer = PlainTextRenderer::with_color(false).with_interrupt(flag.clone());
        assert!(!renderer.should_interrupt());
        flag.store(true, Ordering::Relaxed);
        assert!(renderer.should_interrupt());
        let mut renderer = renderer;
        renderer.clear_interrupt();
        assert!(!flag.load(Ordering::Relaxed));
    }

    #[test]
    fn idle_signal_shuts_down() {
        let shutdown = CancellationToken::new();
        let switch = SignalSwitch::new(shutdown.clone());
        let renderer = PlainTextRenderer::with_color(false).with_signals(&switch);

        assert!(switch.trip());
        assert!(shutdown.is_cancelled());
        assert!(!renderer.should_interrupt());
    }

    #[test]
    fn busy_signal_interrupts_the_stream() {
        let shutdown = CancellationToken::new();
        let switch = SignalSwitch::new(shutdown.clone());
        let mut renderer = PlainTextRenderer::with_color(false).with_signals(&switch);

        renderer.set_busy(true);
        assert!(switch.is_busy());
        assert!(!switch.trip());
        assert!(renderer.should_interrupt());
        assert!(!shutdown.is_cancelled());

        renderer.clear_interrupt();
        renderer.set_busy(false);
        assert!(!switch.is_busy());
        assert!(switch.trip());
        assert!(shutdown.is_cancelled());
    }

    #[test]
    fn channel_renderer_forwards_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut renderer = ChannelRenderer::new(tx);
        renderer.print_text("Hello");
        renderer.print_text(", world");
        renderer.finish_response();
        renderer.print_info("ack");
        let mut received = String::new();
        while let Ok(text) = rx.try_recv() {
            received.push_str(&text);
        }
        assert_eq!(received, "Hello, world\nack\n");
    }

    #[test]
    fn channel_renderer_survives_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut renderer = ChannelRenderer::new(tx);
        renderer.print_text("nobody is listening");
        renderer.finish_response();
    }

    #[test]
    fn buffer_renderer_separates_errors() {
        let mut renderer = BufferRenderer::new();
        renderer.print_text("partial");
        renderer.print_error("boom");
        assert_eq!(renderer.output(), "partial");
        assert_eq!(renderer.errors(), ["boom".to_string()]);
        assert_eq!(renderer.take(), "partial");
        assert_eq!(renderer.output(), "");
    }
}
