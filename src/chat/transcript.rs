//! The conversation transcript.
//!
//! A [`Transcript`] is the ordered history of user and assistant messages for
//! one session.  It is append-only apart from [`Transcript::forget_last`] and
//! [`Transcript::clear`], and it can be snapshotted to a JSON Lines file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{Message, Role};
use crate::utils::time::{FILE_STAMP, format, local_now};

/// Prefix that marks user lines in the rendered log.
pub const USER_PREFIX: &str = ">>> ";

/// Ordered, role-tagged message history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message to the end of the transcript.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Returns the most recent message, if any.
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Removes the last user/assistant exchange.
    ///
    /// Exactly two messages are dropped; a transcript with fewer than two
    /// messages becomes empty.
    pub fn forget_last(&mut self) {
        let keep = self.messages.len().saturating_sub(2);
        self.messages.truncate(keep);
    }

    /// Empties the transcript.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Returns the messages in conversation order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the transcript holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Renders the conversation for reading.
    ///
    /// User lines are prefixed with `>>> `, assistant lines are not, and
    /// messages are separated by blank lines.  Returns `None` when there is
    /// nothing to show.
    pub fn render_log(&self) -> Option<String> {
        let mut log = String::new();
        for message in &self.messages {
            match message.role {
                Role::User => {
                    log.push_str(USER_PREFIX);
                    log.push_str(message.content.trim());
                    log.push_str("\n\n");
                }
                Role::Assistant => {
                    log.push_str(message.content.trim());
                    log.push_str("\n\n");
                }
                Role::System => {}
            }
        }
        let log = log.trim();
        if log.is_empty() {
            None
        } else {
            Some(log.to_string())
        }
    }

    /// Writes the context and every message to a new JSON Lines file in
    /// `log_dir`, creating the directory if needed.  Returns the file path.
    pub fn snapshot(&self, context: &str, log_dir: &Path) -> Result<PathBuf> {
        self.snapshot_at(context, log_dir, local_now())
    }

    /// Like [`Transcript::snapshot`], naming the file after `when`.
    pub fn snapshot_at(
        &self,
        context: &str,
        log_dir: &Path,
        when: OffsetDateTime,
    ) -> Result<PathBuf> {
        fs::create_dir_all(log_dir).map_err(|err| {
            Error::io(
                format!("failed to create log directory {}", log_dir.display()),
                err,
            )
        })?;

        let stamp = format(when, FILE_STAMP);
        let staging = log_dir.join(format!(".{stamp}.jsonl.tmp"));

        if let Err(err) = self.write_records(context, &staging) {
            let _ = fs::remove_file(&staging);
            return Err(err);
        }
        let published = publish(&staging, log_dir, &stamp);
        if let Err(err) = fs::remove_file(&staging) {
            tracing::warn!(path = %staging.display(), error = %err, "failed to remove staging file");
        }
        published
    }

    fn write_records(&self, context: &str, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|err| Error::io(format!("failed to create {}", path.display()), err))?;
        let mut writer = BufWriter::new(file);
        let context = Message::system(context);
        for record in std::iter::once(&context).chain(self.messages.iter()) {
            serde_json::to_writer(&mut writer, record).map_err(|err| {
                Error::decode("failed to serialize transcript", Some(Box::new(err)))
            })?;
            writer.write_all(b"\n")?;
        }
        let file = writer
            .into_inner()
            .map_err(|err| Error::io("failed to flush transcript", err.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}

/// Links `staging` into `log_dir` under the first free name derived from
/// `stamp`: `<stamp>.jsonl`, then `<stamp>-1.jsonl`, `<stamp>-2.jsonl`, ...
/// Existing snapshots are never replaced.
fn publish(staging: &Path, log_dir: &Path, stamp: &str) -> Result<PathBuf> {
    let mut attempt = 0u32;
    loop {
        let file_name = if attempt == 0 {
            format!("{stamp}.jsonl")
        } else {
            format!("{stamp}-{attempt}.jsonl")
        };
        let path = log_dir.join(file_name);
        match fs::hard_link(staging, &path) {
            Ok(()) => return Ok(path),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => {
                return Err(Error::io(format!("failed to write {}", path.display()), err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn exchange(transcript: &mut Transcript, user: &str, assistant: &str) {
        transcript.append(Message::user(user));
        transcript.append(Message::assistant(assistant));
    }

    #[test]
    fn append_and_last() {
        let mut transcript = Transcript::new();
        assert!(transcript.last().is_none());
        transcript.append(Message::user("Hi"));
        assert_eq!(transcript.last(), Some(&Message::user("Hi")));
        transcript.append(Message::assistant("Hello"));
        assert_eq!(transcript.last(), Some(&Message::assistant("Hello")));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn forget_last_drops_an_exchange() {
        let mut transcript = Transcript::new();
        exchange(&mut transcript, "one", "1");
        exchange(&mut transcript, "two", "2");
        transcript.forget_last();
        assert_eq!(
            transcript.messages(),
            &[Message::user("one"), Message::assistant("1")]
        );
    }

    #[test]
    fn forget_last_on_short_transcripts() {
        let mut transcript = Transcript::new();
        transcript.forget_last();
        assert!(transcript.is_empty());

        transcript.append(Message::user("dangling"));
        transcript.forget_last();
        assert!(transcript.is_empty());
    }

    #[test]
    fn forget_last_lengths() {
        for n in 0usize..7 {
            let mut transcript = Transcript::new();
            for i in 0..n {
                if i % 2 == 0 {
                    transcript.append(Message::user(format!("u{i}")));
                } else {
                    transcript.append(Message::assistant(format!("a{i}")));
                }
            }
            transcript.forget_last();
            assert_eq!(transcript.len(), n.saturating_sub(2), "n = {n}");
        }
    }

    #[test]
    fn render_log_marks_user_lines() {
        let mut transcript = Transcript::new();
        exchange(&mut transcript, "  What is 2+2?  ", "\n4\n");
        exchange(&mut transcript, "And 3+3?", "6");
        assert_eq!(
            transcript.render_log().unwrap(),
            ">>> What is 2+2?\n\n4\n\n>>> And 3+3?\n\n6"
        );
    }

    #[test]
    fn render_log_empty() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.render_log(), None);
        transcript.append(Message::assistant("   "));
        assert_eq!(transcript.render_log(), None);
    }

    #[test]
    fn clear_empties() {
        let mut transcript = Transcript::new();
        exchange(&mut transcript, "a", "b");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.render_log(), None);
    }

    #[test]
    fn snapshot_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("log");
        let mut transcript = Transcript::new();
        exchange(&mut transcript, "Bonjour", "Salut, ça va?");

        let path = transcript
            .snapshot_at(
                "Current time: now",
                &log_dir,
                datetime!(2024-03-01 12:34:56 UTC),
            )
            .unwrap();
        assert_eq!(path, log_dir.join("20240301123456.jsonl"));

        let contents = fs::read_to_string(&path).unwrap();
        let records: Vec<Message> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            records,
            vec![
                Message::system("Current time: now"),
                Message::user("Bonjour"),
                Message::assistant("Salut, ça va?"),
            ]
        );
        assert!(contents.contains("ça va"));

        let leftovers: Vec<_> = fs::read_dir(&log_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn snapshots_in_the_same_second_are_kept_apart() {
        let dir = tempfile::tempdir().unwrap();
        let when = datetime!(2024-03-01 12:34:56 UTC);
        let mut transcript = Transcript::new();
        transcript.append(Message::user("keep me"));

        let first = transcript.snapshot_at("ctx", dir.path(), when).unwrap();
        transcript.clear();
        let second = transcript.snapshot_at("ctx", dir.path(), when).unwrap();
        let third = transcript.snapshot_at("ctx", dir.path(), when).unwrap();

        assert_eq!(first, dir.path().join("20240301123456.jsonl"));
        assert_eq!(second, dir.path().join("20240301123456-1.jsonl"));
        assert_eq!(third, dir.path().join("20240301123456-2.jsonl"));
        assert!(fs::read_to_string(&first).unwrap().contains("keep me"));
        assert_eq!(fs::read_to_string(&second).unwrap().lines().count(), 1);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn snapshot_of_empty_transcript_has_context_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = Transcript::new().snapshot("ctx", dir.path()).unwrap();
        let contents = fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let record: Message = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(record.role, Role::System);
    }

    #[test]
    fn snapshot_fails_when_directory_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("log");
        fs::write(&blocker, "not a directory").unwrap();
        let err = Transcript::new().snapshot("ctx", &blocker).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
