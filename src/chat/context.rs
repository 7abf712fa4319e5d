//! The static context blob that frames every prompt.

use std::fs;
use std::io;
use std::path::Path;

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::utils::time::{CLOCK_STAMP, OFFSET_STAMP, format, local_now};

/// Text used when the user has no context file.
pub const DEFAULT_CONTEXT: &str = "The following is a conversation with an AI assistant that is running on the terminal of a computer.";

/// Immutable system-level instructions established at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    text: String,
}

impl Context {
    /// Wraps an already-assembled context string.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Builds the context from the current time and the optional context file.
    pub fn load(context_file: &Path) -> Result<Self> {
        Self::load_at(context_file, local_now())
    }

    /// Builds the context as of `now`.
    ///
    /// A missing context file selects [`DEFAULT_CONTEXT`]; any other read
    /// failure is an error.
    pub fn load_at(context_file: &Path, now: OffsetDateTime) -> Result<Self> {
        let body = match fs::read_to_string(context_file) {
            Ok(contents) => contents.trim().to_string(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => DEFAULT_CONTEXT.to_string(),
            Err(err) => {
                return Err(Error::io(
                    format!("failed to read context file {}", context_file.display()),
                    err,
                ));
            }
        };
        Ok(Self::from_parts(now, &body))
    }

    /// Assembles the context from a timestamp and a body.
    pub fn from_parts(now: OffsetDateTime, body: &str) -> Self {
        let text = format!(
            "Current time: {} UTC{}\n\n{}",
            format(now, CLOCK_STAMP),
            format(now, OFFSET_STAMP),
            body
        );
        Self { text }
    }

    /// The full context text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The context with surrounding whitespace removed, or `None` when blank.
    pub fn system_text(&self) -> Option<&str> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }
}

impl std::fmt::Display for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn missing_file_uses_default() {
        let dir = tempfile::tempdir().unwrap();
        let context =
            Context::load_at(&dir.path().join("context.txt"), datetime!(2024-01-31 21:07 UTC))
                .unwrap();
        assert_eq!(
            context.as_str(),
            format!("Current time: Wed, Jan 31 2024 09:07 PM UTC+00:00\n\n{DEFAULT_CONTEXT}")
        );
    }

    #[test]
    fn file_contents_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.txt");
        fs::write(&path, "\n  You are a terse shell expert.  \n\n").unwrap();
        let context = Context::load_at(&path, datetime!(2024-01-31 09:07 -5)).unwrap();
        assert_eq!(
            context.as_str(),
            "Current time: Wed, Jan 31 2024 09:07 AM UTC-05:00\n\nYou are a terse shell expert."
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be read as a string.
        let err = Context::load_at(dir.path(), datetime!(2024-01-31 09:07 UTC)).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn blank_context_has_no_system_text() {
        assert_eq!(Context::new("  \n ").system_text(), None);
        assert_eq!(Context::default().system_text(), None);
        assert_eq!(Context::new(" hi \n").system_text(), Some("hi"));
    }
}
