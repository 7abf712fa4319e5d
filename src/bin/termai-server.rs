//! Chat session server.
//!
//! Runs an interactive chat prompt in this terminal and, at the same time,
//! accepts messages from `termai` invocations in other terminals.  Every
//! message, from either side, continues the same conversation.
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY=sk-...
//!
//! # Basic usage with default settings
//! termai-server
//!
//! # Specify a model and a context file
//! termai-server --model gpt-4 --context-file ~/notes/context.txt
//!
//! # From another terminal
//! termai "how do I list open ports?"
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/log` - Show the conversation so far
//! - `/save` - Save the conversation under the log directory
//! - `/clear` - Clear conversation history
//! - `/forget` - Drop the last exchange
//! - `/context` - Show the context
//! - `/exit` - Exit the application

use arrrg::CommandLine;
use tokio_util::sync::CancellationToken;

use termai::chat::{
    ChatArgs, ChatConfig, ChatSession, Context, LineReader, PROMPT, run_interactive,
    serve_remote, share,
};
use termai::{
    Error, OpenAI, PlainTextRenderer, SignalSwitch, UnixSocketChannel, init_tracing,
    register_biometrics,
};

/// Main entry point for the termai-server application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let (args, _) = ChatArgs::from_command_line_relaxed("termai-server [OPTIONS]");
    let config = ChatConfig::try_from(args).unwrap_or_else(|err| fail(&err));

    let client = OpenAI::new(None).unwrap_or_else(|err| fail(&err));
    let context = Context::load(&config.context_file).unwrap_or_else(|err| fail(&err));
    register_biometrics(biometrics::Collector::new());

    // A signal stops the current turn, or ends the session when idle.
    let shutdown = CancellationToken::new();
    let signals = SignalSwitch::new(shutdown.clone());
    let handler = signals.clone();
    ctrlc::set_handler(move || {
        if handler.trip() {
            tracing::info!("signal received while idle; shutting down");
        }
    })?;

    let session = share(ChatSession::from_config(client, context, &config));
    let channel = UnixSocketChannel::bind(&config.socket_path)
        .await
        .unwrap_or_else(|err| fail(&err));
    let remote = tokio::spawn(serve_remote(
        session.clone(),
        channel,
        PlainTextRenderer::with_color(config.use_color),
        shutdown.clone(),
    ));

    print_banner(&config);

    let mut input = LineReader::spawn(PROMPT);
    let mut renderer = PlainTextRenderer::with_color(config.use_color).with_signals(&signals);
    tokio::select! {
        end = run_interactive(&session, &mut input, &mut renderer) => {
            tracing::info!(?end, "interactive loop ended");
        }
        _ = shutdown.cancelled() => {
            tracing::info!("session shut down by signal or remote caller");
        }
    }

    shutdown.cancel();
    match remote.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "remote channel closed with an error"),
        Err(err) => tracing::warn!(error = %err, "remote task failed"),
    }

    println!("\nGoodbye!");
    Ok(())
}

fn print_banner(config: &ChatConfig) {
    println!("termai (model: {})", config.params.model);
    println!(
        "Send messages from another terminal with: termai <message> (socket: {})",
        config.socket_path.display()
    );
    println!("Type /help for commands, exit to quit\n");
}

/// Prints a startup failure and exits.
fn fail(err: &Error) -> ! {
    eprintln!("{err}");
    std::process::exit(1);
}
