//! Configuration types for the chat server.
//!
//! This module provides CLI argument parsing via `arrrg` and the resolved
//! configuration a session is started from.

use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;

use crate::error::{Error, Result};
use crate::types::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenerationParameters};

/// Name of the socket file placed in the temporary directory.
pub const SOCKET_FILE_NAME: &str = "termai.sock";

/// Command-line arguments for the termai-server tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: gpt-3.5-turbo)", "MODEL")]
    pub model: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: 1000)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature, kept as text until resolved.
    #[arrrg(optional, "Sampling temperature (default: 1.0)", "TEMP")]
    pub temperature: Option<String>,

    /// Context file read at startup.
    #[arrrg(optional, "Context file (default: ~/.ai/context.txt)", "PATH")]
    pub context_file: Option<String>,

    /// Directory that receives saved conversations.
    #[arrrg(optional, "Directory for saved logs (default: ~/.ai/log)", "DIR")]
    pub log_dir: Option<String>,

    /// Socket the thin client connects to.
    #[arrrg(optional, "Unix socket path (default: <tmpdir>/termai.sock)", "PATH")]
    pub socket: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Command-line arguments for the termai thin client.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ClientArgs {
    /// Socket of the running session.
    #[arrrg(optional, "Unix socket path (default: <tmpdir>/termai.sock)", "PATH")]
    pub socket: Option<String>,
}

impl ClientArgs {
    /// The socket to connect to.
    pub fn socket_path(&self) -> PathBuf {
        match &self.socket {
            Some(path) => expand_home(path),
            None => default_socket_path(),
        }
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Generation parameters sent with every request.
    pub params: GenerationParameters,

    /// File whose contents become the session context.
    pub context_file: PathBuf,

    /// Directory that receives `/save` snapshots.
    pub log_dir: PathBuf,

    /// Path of the Unix socket serving remote requests.
    pub socket_path: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: gpt-3.5-turbo
    /// - Max tokens: 1000
    /// - Temperature: 1.0
    /// - Context file: ~/.ai/context.txt
    /// - Log directory: ~/.ai/log
    /// - Socket: termai.sock in the temporary directory
    pub fn new() -> Self {
        let ai_dir = ai_dir();
        Self {
            params: GenerationParameters::new(),
            context_file: ai_dir.join("context.txt"),
            log_dir: ai_dir.join("log"),
            socket_path: default_socket_path(),
            use_color: true,
        }
    }

    /// Sets the generation parameters.
    pub fn with_params(mut self, params: GenerationParameters) -> Self {
        self.params = params;
        self
    }

    /// Sets the context file.
    pub fn with_context_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.context_file = path.into();
        self
    }

    /// Sets the log directory.
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = path.into();
        self
    }

    /// Sets the socket path.
    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self> {
        let temperature = match args.temperature.as_deref() {
            Some(text) => parse_temperature(text)?,
            None => DEFAULT_TEMPERATURE,
        };
        let max_tokens = args.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(Error::config(
                "max-tokens must be positive",
                Some("max-tokens".to_string()),
            ));
        }
        let params = GenerationParameters::new()
            .with_model(args.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()))
            .with_max_tokens(max_tokens)
            .with_temperature(temperature);

        let mut config = ChatConfig::new().with_params(params);
        if let Some(path) = args.context_file {
            config = config.with_context_file(expand_home(&path));
        }
        if let Some(path) = args.log_dir {
            config = config.with_log_dir(expand_home(&path));
        }
        if let Some(path) = args.socket {
            config = config.with_socket_path(expand_home(&path));
        }
        if args.no_color {
            config = config.without_color();
        }
        Ok(config)
    }
}

fn parse_temperature(text: &str) -> Result<f32> {
    let invalid = || {
        Error::config(
            format!("temperature must be a number between 0 and 2, got {text:?}"),
            Some("temperature".to_string()),
        )
    };
    let temperature = text.trim().parse::<f32>().map_err(|_| invalid())?;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid());
    }
    Ok(temperature)
}

fn default_socket_path() -> PathBuf {
    std::env::temp_dir().join(SOCKET_FILE_NAME)
}

/// The per-user `.ai` directory.
fn ai_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ai")
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ChatConfig::new();
        assert_eq!(config.params.model, "gpt-3.5-turbo");
        assert_eq!(config.params.max_tokens, 1000);
        assert_eq!(config.params.temperature, 1.0);
        assert!(config.use_color);
        assert!(config.context_file.ends_with(".ai/context.txt"));
        assert!(config.log_dir.ends_with(".ai/log"));
        assert_eq!(
            config.socket_path.file_name().and_then(|n| n.to_str()),
            Some(SOCKET_FILE_NAME)
        );
    }

    #[test]
    fn config_from_args_defaults() {
        let config = ChatConfig::try_from(ChatArgs::default()).unwrap();
        assert_eq!(config, ChatConfig::new());
    }

    #[test]
    fn config_from_args_custom() {
        let args = ChatArgs {
            model: Some("gpt-4".to_string()),
            max_tokens: Some(256),
            temperature: Some("0.2".to_string()),
            context_file: Some("/etc/termai/context.txt".to_string()),
            log_dir: Some("/var/tmp/termai".to_string()),
            socket: Some("/run/termai.sock".to_string()),
            no_color: true,
        };
        let config = ChatConfig::try_from(args).unwrap();
        assert_eq!(config.params.model, "gpt-4");
        assert_eq!(config.params.max_tokens, 256);
        assert_eq!(config.params.temperature, 0.2);
        assert_eq!(config.context_file, PathBuf::from("/etc/termai/context.txt"));
        assert_eq!(config.log_dir, PathBuf::from("/var/tmp/termai"));
        assert_eq!(config.socket_path, PathBuf::from("/run/termai.sock"));
        assert!(!config.use_color);
    }

    #[test]
    fn bad_temperature_is_rejected() {
        for text in ["hot", "-0.5", "2.5", "NaN"] {
            let args = ChatArgs {
                temperature: Some(text.to_string()),
                ..ChatArgs::default()
            };
            let err = ChatConfig::try_from(args).unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{text}");
        }
    }

    #[test]
    fn zero_max_tokens_is_rejected() {
        let args = ChatArgs {
            max_tokens: Some(0),
            ..ChatArgs::default()
        };
        assert!(ChatConfig::try_from(args).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/notes.txt"), home.join("notes.txt"));
        }
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }

    #[test]
    fn client_socket_matches_server_default() {
        assert_eq!(ClientArgs::default().socket_path(), ChatConfig::new().socket_path);
        let args = ClientArgs {
            socket: Some("/run/other.sock".to_string()),
        };
        assert_eq!(args.socket_path(), PathBuf::from("/run/other.sock"));
    }

    #[test]
    fn config_builder_pattern() {
        let config = ChatConfig::new()
            .with_params(GenerationParameters::new().with_model("gpt-4o"))
            .with_context_file("ctx.txt")
            .with_log_dir("logs")
            .with_socket_path("chat.sock")
            .without_color();
        assert_eq!(config.params.model, "gpt-4o");
        assert_eq!(config.context_file, PathBuf::from("ctx.txt"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.socket_path, PathBuf::from("chat.sock"));
        assert!(!config.use_color);
    }
}
