//! Send one message to a running termai-server.
//!
//! The message is the command-line arguments joined with spaces, or standard
//! input when there are none.  The reply is printed as it streams in.
//!
//! # Usage
//!
//! ```bash
//! termai "what does this error mean?"
//! cargo build 2>&1 | termai
//! termai /save
//! ```

use std::process::ExitCode;

use arrrg::CommandLine;
use tokio::io::AsyncReadExt;

use termai::chat::ClientArgs;
use termai::{ErrorKind, RemoteClient, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let (args, free) = ClientArgs::from_command_line_relaxed("termai [OPTIONS] [MESSAGE...]");

    let message = if free.is_empty() {
        let mut message = String::new();
        if let Err(err) = tokio::io::stdin().read_to_string(&mut message).await {
            eprintln!("Error: failed to read standard input: {err}");
            return ExitCode::FAILURE;
        }
        message
    } else {
        free.join(" ")
    };
    if message.trim().is_empty() {
        return ExitCode::SUCCESS;
    }

    let client = match RemoteClient::connect(&args.socket_path()).await {
        Ok(client) => client,
        Err(err) if err.kind() == ErrorKind::Transport => {
            eprintln!("Error: chat server is not running.");
            return ExitCode::FAILURE;
        }
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = tokio::io::stdout();
    match client.request(&message, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\nError: {err}");
            ExitCode::FAILURE
        }
    }
}
