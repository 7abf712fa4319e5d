//! Error types for termai.
//!
//! One error type is shared by the completion client, the chat session, and
//! the remote request channel.  [`Error::kind`] sorts every error into the
//! handful of cases the session controller recovers from differently.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

type Source = Arc<dyn error::Error + Send + Sync>;

/// Coarse classification of an [`Error`], consumed by the session controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The provider rejected the request or failed while producing a response.
    Request,

    /// The user interrupted a streaming response.
    Interrupted,

    /// A local filesystem operation failed.
    Io,

    /// The remote request channel failed or is not present.
    Transport,

    /// The process cannot start a session (missing credential, bad configuration).
    Startup,
}

/// The main error type for termai.
#[derive(Clone, Debug)]
pub enum Error {
    /// The provider answered with an error status not covered below.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Error type string from the provider.
        error_type: Option<String>,
        /// Human-readable error message.
        message: String,
        /// Request ID for debugging and support.
        request_id: Option<String>,
    },

    /// The credential was refused (401) or lacks access (403).
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// The request was invalid, too long, or refused by content policy.
    BadRequest {
        /// Human-readable error message.
        message: String,
        /// Parameter that caused the error.
        param: Option<String>,
    },

    /// Rate limit exceeded.
    RateLimit {
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// The provider failed internally or is overloaded.
    Unavailable {
        /// HTTP status code.
        status_code: u16,
        /// Human-readable error message.
        message: String,
        /// Time to wait before retrying, in seconds.
        retry_after: Option<u64>,
    },

    /// The request took too long.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The provider could not be reached.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The response stream broke after it started.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// Data could not be encoded or decoded (JSON, UTF-8).
    Decode {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Source>,
    },

    /// The user aborted a streaming response.
    Abort {
        /// Human-readable error message.
        message: String,
    },

    /// A local filesystem operation failed.
    Io {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Arc<io::Error>,
    },

    /// The remote request channel failed.
    Transport {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<io::Error>>,
    },

    /// Invalid configuration: an argument, the API key, or the base URL.
    Config {
        /// Human-readable error message.
        message: String,
        /// The setting at fault.
        param: Option<String>,
    },

    /// A required credential is missing.
    MissingCredential {
        /// Name of the environment variable that must be set.
        variable: String,
    },
}

impl Error {
    /// Creates a new API error.
    pub fn api(
        status_code: u16,
        error_type: Option<String>,
        message: impl Into<String>,
        request_id: Option<String>,
    ) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
            request_id,
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new bad request error.
    pub fn bad_request(message: impl Into<String>, param: Option<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
            param,
        }
    }

    /// Creates a new rate limit error.
    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new provider-unavailable error.
    pub fn unavailable(
        status_code: u16,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Error::Unavailable {
            status_code,
            message: message.into(),
            retry_after,
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Source::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Source::from),
        }
    }

    /// Creates a new decode error.
    pub fn decode(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Decode {
            message: message.into(),
            source: source.map(Source::from),
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new transport error.
    pub fn transport(message: impl Into<String>, source: Option<io::Error>) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::new),
        }
    }

    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Config {
            message: message.into(),
            param,
        }
    }

    /// Creates a new missing credential error.
    pub fn missing_credential(variable: impl Into<String>) -> Self {
        Error::MissingCredential {
            variable: variable.into(),
        }
    }

    /// Classifies this error for recovery decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Abort { .. } => ErrorKind::Interrupted,
            Error::Io { .. } => ErrorKind::Io,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Config { .. } | Error::MissingCredential { .. } => ErrorKind::Startup,
            Error::Api { .. }
            | Error::Authentication { .. }
            | Error::BadRequest { .. }
            | Error::RateLimit { .. }
            | Error::Unavailable { .. }
            | Error::Timeout { .. }
            | Error::Connection { .. }
            | Error::Streaming { .. }
            | Error::Decode { .. } => ErrorKind::Request,
        }
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is a bad request.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Error::BadRequest { .. })
    }

    /// Returns true if this error is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit { .. })
    }

    /// Returns true if this error is an abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if this error is a remote channel failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Returns true if the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit { .. }
                | Error::Unavailable { .. }
                | Error::Timeout { .. }
                | Error::Connection { .. }
        )
    }

    /// Returns the request ID associated with this error, if any.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Api { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } | Error::Unavailable { status_code, .. } => {
                Some(*status_code)
            }
            Error::Authentication { .. } => Some(401),
            Error::BadRequest { .. } => Some(400),
            Error::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_type,
                message,
                request_id,
            } => {
                let label = error_type.as_deref().unwrap_or("API error");
                write!(f, "{label} ({status_code}): {message}")?;
                if let Some(request_id) = request_id {
                    write!(f, " (Request ID: {request_id})")?;
                }
                Ok(())
            }
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::BadRequest { message, param } => match param {
                Some(param) => write!(f, "Bad request: {message} (parameter: {param})"),
                None => write!(f, "Bad request: {message}"),
            },
            Error::RateLimit {
                message,
                retry_after,
            } => match retry_after {
                Some(seconds) => {
                    write!(f, "Rate limit exceeded: {message} (retry after {seconds}s)")
                }
                None => write!(f, "Rate limit exceeded: {message}"),
            },
            Error::Unavailable {
                status_code,
                message,
                ..
            } => write!(f, "Service unavailable ({status_code}): {message}"),
            Error::Timeout { message, duration } => match duration {
                Some(seconds) => write!(f, "Timeout: {message} ({seconds} seconds)"),
                None => write!(f, "Timeout: {message}"),
            },
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
            Error::Decode { message, .. } => write!(f, "Decode error: {message}"),
            Error::Abort { message } => write!(f, "Aborted: {message}"),
            Error::Io { message, source } => write!(f, "{message}: {source}"),
            Error::Transport { message, .. } => write!(f, "Transport error: {message}"),
            Error::Config { message, param } => match param {
                Some(param) => write!(f, "Invalid {param}: {message}"),
                None => write!(f, "Invalid configuration: {message}"),
            },
            Error::MissingCredential { variable } => {
                write!(f, "Please set {variable} environment variable.")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Streaming { source, .. }
            | Error::Decode { source, .. } => source
                .as_deref()
                .map(|e| e as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Transport { source, .. } => source
                .as_deref()
                .map(|e| e as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io("I/O failure", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::decode(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::config(err.to_string(), Some("base URL".to_string()))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::decode(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for termai operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_are_request_kind() {
        assert_eq!(
            Error::bad_request("content policy", None).kind(),
            ErrorKind::Request
        );
        assert_eq!(
            Error::streaming("connection reset", None).kind(),
            ErrorKind::Request
        );
        assert_eq!(
            Error::unavailable(503, "overloaded", Some(3)).kind(),
            ErrorKind::Request
        );
    }

    #[test]
    fn local_failures_keep_their_kind() {
        let err = Error::io("disk full", io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(Error::abort("interrupted").kind(), ErrorKind::Interrupted);
        assert_eq!(
            Error::transport("socket closed", None).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            Error::missing_credential("OPENAI_API_KEY").kind(),
            ErrorKind::Startup
        );
        let url_err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert_eq!(url_err.kind(), ErrorKind::Startup);
    }

    #[test]
    fn display_formats() {
        assert_eq!(
            Error::bad_request("bad temperature", Some("temperature".to_string())).to_string(),
            "Bad request: bad temperature (parameter: temperature)"
        );
        assert_eq!(
            Error::missing_credential("OPENAI_API_KEY").to_string(),
            "Please set OPENAI_API_KEY environment variable."
        );
        assert_eq!(
            Error::api(418, None, "teapot", Some("req_1".to_string())).to_string(),
            "API error (418): teapot (Request ID: req_1)"
        );
        assert_eq!(
            Error::io("failed to write log", io::Error::other("disk full")).to_string(),
            "failed to write log: disk full"
        );
    }

    #[test]
    fn retryable_errors() {
        assert!(Error::rate_limit("slow down", Some(2)).is_retryable());
        assert!(Error::timeout("slow", None).is_retryable());
        assert!(!Error::authentication("bad key").is_retryable());
        assert_eq!(Error::rate_limit("slow down", None).status_code(), Some(429));
    }

    #[test]
    fn sources_are_preserved() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert!(error::Error::source(&err).is_some());
        let err = Error::transport("gone", Some(io::Error::other("broken pipe")));
        assert!(error::Error::source(&err).is_some());
        assert!(error::Error::source(&Error::abort("stop")).is_none());
    }
}
