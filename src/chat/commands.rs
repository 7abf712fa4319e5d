//! Slash command parsing for the chat session.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to inspect and edit the session without sending messages
//! to the API.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Show the conversation log.
    Log,

    /// Save the conversation to a timestamped file.
    Save,

    /// Clear the conversation history.
    Clear,

    /// Drop the last user/assistant exchange.
    Forget,

    /// Show the current context.
    Context,

    /// Exit the chat.
    Exit,

    /// A command nobody recognizes; executing it does nothing.
    Unknown(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input starts with `/`, or `None` if it
/// should be treated as a regular message.  The whole trimmed line is the
/// command: `/log please` and `/LOG` are unknown.
///
/// # Examples
///
/// ```
/// # use termai::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/log"), Some(ChatCommand::Log));
/// assert_eq!(parse_command("/nope"), Some(ChatCommand::Unknown("nope".to_string())));
/// assert!(parse_command("Hello!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let command = input.trim().strip_prefix('/')?;

    let result = match command {
        "help" => ChatCommand::Help,
        "log" => ChatCommand::Log,
        "save" => ChatCommand::Save,
        "clear" => ChatCommand::Clear,
        "forget" => ChatCommand::Forget,
        "context" => ChatCommand::Context,
        "exit" => ChatCommand::Exit,
        _ => ChatCommand::Unknown(command.to_string()),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"/help    - view available commands
/exit    - exit the program
/log     - view the current conversation log
/save    - save the conversation log to a file
/clear   - clear all the conversation log
/forget  - cancel the previous message
/context - show the current chat context"#
}
