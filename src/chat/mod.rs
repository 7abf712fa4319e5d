//! The terminal chat session.
//!
//! A session streams completions for a running conversation and serves two
//! entry points at once: an interactive prompt and a remote request channel.
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`context`]: the context blob that frames every prompt
//! - [`transcript`]: conversation history, log rendering, and snapshots
//! - [`prompt`]: prompt assembly
//! - [`session`]: the streaming driver and command execution
//! - [`commands`]: slash command parsing
//! - [`controller`]: the interactive and remote loops
//! - [`input`]: line-editor input

pub mod commands;
pub mod config;
pub mod context;
pub mod controller;
pub mod input;
pub mod prompt;
pub mod session;
pub mod transcript;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ClientArgs};
pub use context::{Context, DEFAULT_CONTEXT};
pub use controller::{
    EXIT_WORD, LoopEnd, SharedSession, run_interactive, serve_remote, share,
};
pub use input::{InputEvent, InputSource, LineReader, PROMPT, ScriptedInput};
pub use prompt::assemble;
pub use session::{ChatSession, CommandOutcome};
pub use transcript::{Transcript, USER_PREFIX};
