//! The loops that feed a shared session.
//!
//! One session serves two entry points: the interactive prompt and the
//! remote request channel.  Both hold the session lock for a whole turn, so
//! turns never interleave.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::chat::commands::parse_command;
use crate::chat::input::{InputEvent, InputSource};
use crate::chat::session::{ChatSession, CommandOutcome};
use crate::error::{Error, ErrorKind, Result};
use crate::observability::{REMOTE_ERRORS, REMOTE_REQUESTS};
use crate::provider::CompletionProvider;
use crate::render::Renderer;
use crate::transport::{ACK, Exchange, RequestChannel};

/// Bare word that ends the interactive loop, or stops remote serving.
pub const EXIT_WORD: &str = "exit";

/// A session shared between the interactive and remote loops.
pub type SharedSession<P> = Arc<Mutex<ChatSession<P>>>;

/// Wraps a session for sharing.
pub fn share<P: CompletionProvider>(session: ChatSession<P>) -> SharedSession<P> {
    Arc::new(Mutex::new(session))
}

/// Why the interactive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The user asked to exit.
    Exit,
    /// The user pressed Ctrl-C at the prompt.
    Interrupted,
    /// Input ran out.
    EndOfInput,
}

/// Runs the interactive prompt until the user leaves.
///
/// Blank lines are ignored, `/`-prefixed lines are commands, and everything
/// else is sent as an utterance.  Failures are reported to `renderer` and the
/// loop keeps going.  The renderer is marked busy from the moment a line is
/// accepted until the next read.
pub async fn run_interactive<P: CompletionProvider>(
    session: &SharedSession<P>,
    input: &mut dyn InputSource,
    renderer: &mut dyn Renderer,
) -> LoopEnd {
    loop {
        renderer.set_busy(false);
        renderer.clear_interrupt();
        let line = match input.read_line().await {
            InputEvent::Line(line) => line,
            InputEvent::Interrupted => return LoopEnd::Interrupted,
            InputEvent::Eof => return LoopEnd::EndOfInput,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == EXIT_WORD {
            return LoopEnd::Exit;
        }

        renderer.set_busy(true);
        if let Some(command) = parse_command(line) {
            let outcome = session.lock().await.execute(&command, renderer);
            match outcome {
                Ok(CommandOutcome::Exit) => {
                    renderer.set_busy(false);
                    return LoopEnd::Exit;
                }
                Ok(CommandOutcome::Continue) => {}
                Err(err) => report(&err, renderer),
            }
            continue;
        }

        let mut session = session.lock().await;
        if let Err(err) = session.stream_completion(line, renderer).await {
            report(&err, renderer);
        }
    }
}

/// Serves remote exchanges until the channel ends, a caller sends `exit`, or
/// `shutdown` is cancelled.
///
/// Command output goes to `local`, the session's own terminal; the caller
/// only receives [`ACK`].  A remote `/exit` cancels `shutdown` so the whole
/// process winds down.  The channel is closed before this returns.
pub async fn serve_remote<P, C, R>(
    session: SharedSession<P>,
    mut channel: C,
    mut local: R,
    shutdown: CancellationToken,
) -> Result<()>
where
    P: CompletionProvider,
    C: RequestChannel,
    R: Renderer,
{
    let served = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            next = channel.next_exchange() => next,
        };
        let exchange = match next {
            Ok(Some(exchange)) => exchange,
            Ok(None) => break Ok(()),
            Err(err) => {
                REMOTE_ERRORS.click();
                tracing::error!(error = %err, "remote channel failed");
                break Err(err);
            }
        };
        REMOTE_REQUESTS.click();
        match handle_exchange(&session, exchange, &mut local).await {
            Remote::Continue => {}
            Remote::StopServing => {
                tracing::info!("remote caller asked to stop serving");
                break Ok(());
            }
            Remote::Shutdown => {
                tracing::info!("remote caller asked to exit");
                shutdown.cancel();
                break Ok(());
            }
        }
    };
    let closed = channel.close();
    served.and(closed)
}

enum Remote {
    Continue,
    StopServing,
    Shutdown,
}

async fn handle_exchange<P, R>(
    session: &SharedSession<P>,
    mut exchange: Exchange,
    local: &mut R,
) -> Remote
where
    P: CompletionProvider,
    R: Renderer,
{
    let payload = exchange.payload().trim().to_string();
    tracing::debug!(payload = %payload, "remote request");

    let outcome = if payload == EXIT_WORD {
        Remote::StopServing
    } else if payload.is_empty() {
        Remote::Continue
    } else if let Some(command) = parse_command(&payload) {
        let result = session.lock().await.execute(&command, local);
        exchange.sink().print_info(ACK);
        match result {
            Ok(CommandOutcome::Exit) => Remote::Shutdown,
            Ok(CommandOutcome::Continue) => Remote::Continue,
            Err(err) => {
                report(&err, local);
                Remote::Continue
            }
        }
    } else {
        let mut session = session.lock().await;
        if let Err(err) = session.stream_completion(&payload, exchange.sink()).await {
            REMOTE_ERRORS.click();
            report(&err, exchange.sink());
        }
        Remote::Continue
    };

    exchange.finish().await;
    outcome
}

/// Shows a recoverable failure.
fn report(err: &Error, renderer: &mut dyn Renderer) {
    match err.kind() {
        // The driver has already shown the interruption.
        ErrorKind::Interrupted => {}
        ErrorKind::Io => renderer.print_error(&format!("could not save: {err}")),
        ErrorKind::Request | ErrorKind::Transport | ErrorKind::Startup => {
            renderer.print_error(&err.to_string())
        }
    }
}
