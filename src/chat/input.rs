//! Interactive line input.
//!
//! The line editor blocks, so it runs on its own thread and hands lines to
//! the async side over channels.  A line is only read when the controller
//! asks for one, which keeps the prompt from appearing while a response is
//! still streaming.

use std::sync::mpsc as std_mpsc;
use std::thread;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

/// Prompt shown by the interactive loop.
pub const PROMPT: &str = ">>> ";

/// One result of asking for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line of text, without its terminator.
    Line(String),
    /// The user pressed Ctrl-C at the prompt.
    Interrupted,
    /// Input is exhausted.
    Eof,
}

/// A source of user lines.
#[async_trait::async_trait]
pub trait InputSource: Send {
    /// Waits for the next line.
    async fn read_line(&mut self) -> InputEvent;
}

/// Line-editor input with history, read on a dedicated thread.
pub struct LineReader {
    requests: std_mpsc::Sender<()>,
    events: mpsc::UnboundedReceiver<InputEvent>,
}

impl LineReader {
    /// Starts the editor thread.
    pub fn spawn(prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let (requests, wanted) = std_mpsc::channel::<()>();
        let (events_tx, events) = mpsc::unbounded_channel();
        thread::spawn(move || {
            let mut editor = match DefaultEditor::new() {
                Ok(editor) => editor,
                Err(err) => {
                    tracing::error!(error = %err, "could not start line editor");
                    let _ = events_tx.send(InputEvent::Eof);
                    return;
                }
            };
            while wanted.recv().is_ok() {
                let event = match editor.readline(&prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            let _ = editor.add_history_entry(line.as_str());
                        }
                        InputEvent::Line(line)
                    }
                    Err(ReadlineError::Interrupted) => InputEvent::Interrupted,
                    Err(ReadlineError::Eof) => InputEvent::Eof,
                    Err(err) => {
                        tracing::error!(error = %err, "line editor failed");
                        InputEvent::Eof
                    }
                };
                let last = !matches!(event, InputEvent::Line(_));
                if events_tx.send(event).is_err() || last {
                    break;
                }
            }
        });
        Self { requests, events }
    }
}

#[async_trait::async_trait]
impl InputSource for LineReader {
    async fn read_line(&mut self) -> InputEvent {
        if self.requests.send(()).is_err() {
            return InputEvent::Eof;
        }
        self.events.recv().await.unwrap_or(InputEvent::Eof)
    }
}

/// Input replayed from a fixed list of lines, then end of input.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: std::collections::VecDeque<InputEvent>,
}

impl ScriptedInput {
    /// Creates input that yields each of `lines` in order.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(|l| InputEvent::Line(l.into())).collect(),
        }
    }

    /// Appends an interrupt after the queued lines.
    pub fn then_interrupt(mut self) -> Self {
        self.lines.push_back(InputEvent::Interrupted);
        self
    }
}

#[async_trait::async_trait]
impl InputSource for ScriptedInput {
    async fn read_line(&mut self) -> InputEvent {
        self.lines.pop_front().unwrap_or(InputEvent::Eof)
    }
}
