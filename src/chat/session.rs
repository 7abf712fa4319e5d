//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! state, drives streaming completions, and executes slash commands.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;

use crate::chat::commands::{ChatCommand, help_text};
use crate::chat::config::ChatConfig;
use crate::chat::context::Context;
use crate::chat::prompt::assemble;
use crate::chat::transcript::Transcript;
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_COMMANDS, SESSION_SAVES, SESSION_TURN_DURATION, SESSION_TURN_ERRORS, SESSION_TURNS,
    STREAM_BYTES, STREAM_FRAGMENTS,
};
use crate::provider::CompletionProvider;
use crate::render::Renderer;
use crate::types::{ChatCompletionRequest, GenerationParameters, Message};

/// What the caller should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep reading input.
    Continue,
    /// Stop the loop that issued the command.
    Exit,
}

/// A chat session that manages conversation state and API interactions.
///
/// The session holds the context, the generation parameters, and the
/// transcript, and streams responses from a [`CompletionProvider`].
pub struct ChatSession<P: CompletionProvider> {
    provider: P,
    context: Context,
    params: GenerationParameters,
    transcript: Transcript,
    log_dir: PathBuf,
}

impl<P: CompletionProvider> ChatSession<P> {
    /// Creates a new chat session.
    pub fn new(
        provider: P,
        context: Context,
        params: GenerationParameters,
        log_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            context,
            params,
            transcript: Transcript::new(),
            log_dir: log_dir.into(),
        }
    }

    /// Creates a session from resolved configuration.
    pub fn from_config(provider: P, context: Context, config: &ChatConfig) -> Self {
        Self::new(provider, context, config.params.clone(), &config.log_dir)
    }

    /// Sends an utterance and streams the response.
    ///
    /// This method:
    /// 1. Records the utterance in the transcript
    /// 2. Sends a streaming request built from the context and history
    /// 3. Renders fragments as they arrive, skipping leading blank ones
    /// 4. Records the trimmed reply and ends the response with a newline
    ///
    /// Returns the recorded reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the request, the stream
    /// fails, or the renderer asks for an interrupt.  The utterance stays in
    /// the transcript and nothing from the partial reply is recorded.
    pub async fn stream_completion(
        &mut self,
        utterance: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        SESSION_TURNS.click();
        let started = Instant::now();
        let messages = assemble(&self.context, &mut self.transcript, utterance);
        let request = ChatCompletionRequest::streaming(&self.params, messages);
        tracing::debug!(
            model = %self.params.model,
            messages = request.messages.len(),
            "starting turn"
        );

        let result = self.consume(request, renderer).await;
        SESSION_TURN_DURATION.add(started.elapsed().as_secs_f64());

        match result {
            Ok(reply) => {
                self.transcript.append(Message::assistant(reply.clone()));
                renderer.finish_response();
                Ok(reply)
            }
            Err(err) => {
                SESSION_TURN_ERRORS.click();
                tracing::warn!(error = %err, "turn failed; partial reply discarded");
                Err(err)
            }
        }
    }

    async fn consume(
        &self,
        request: ChatCompletionRequest,
        renderer: &mut dyn Renderer,
    ) -> Result<String> {
        let mut fragments = self.provider.stream_completion(request).await?;
        let mut reply = String::new();
        while let Some(fragment) = fragments.next().await {
            if renderer.should_interrupt() {
                renderer.print_interrupted();
                return Err(Error::abort("response interrupted"));
            }
            let fragment = fragment?;
            STREAM_FRAGMENTS.click();
            if reply.is_empty() && fragment.trim().is_empty() {
                continue;
            }
            STREAM_BYTES.count(fragment.len() as u64);
            renderer.print_text(&fragment);
            reply.push_str(&fragment);
        }
        Ok(reply.trim().to_string())
    }

    /// Runs a slash command.
    ///
    /// # Errors
    ///
    /// Only `/save` can fail, when the snapshot cannot be written.
    pub fn execute(
        &mut self,
        command: &ChatCommand,
        renderer: &mut dyn Renderer,
    ) -> Result<CommandOutcome> {
        SESSION_COMMANDS.click();
        match command {
            ChatCommand::Help => renderer.print_info(&format!("\n{}\n", help_text())),
            ChatCommand::Log => match self.transcript.render_log() {
                Some(log) => renderer.print_highlighted(&format!("\n{log}\n")),
                None => renderer.print_info("\nempty\n"),
            },
            ChatCommand::Save => {
                let path = self.save()?;
                renderer.print_info(&format!("\nsaved: {}\n", path.display()));
            }
            ChatCommand::Clear => {
                self.clear();
                renderer.print_info("\ncleared\n");
            }
            ChatCommand::Forget => {
                self.forget();
                if let Some(last) = self.transcript.last() {
                    renderer.print_info(&format!("\n{}\n", last.content));
                }
            }
            ChatCommand::Context => renderer.print_info(&format!("\n{}\n", self.context)),
            ChatCommand::Exit => return Ok(CommandOutcome::Exit),
            ChatCommand::Unknown(name) => {
                tracing::debug!(command = %name, "ignoring unknown command");
            }
        }
        Ok(CommandOutcome::Continue)
    }

    /// Writes a snapshot of the conversation into the log directory.
    pub fn save(&self) -> Result<PathBuf> {
        let path = self.transcript.snapshot(self.context.as_str(), &self.log_dir)?;
        SESSION_SAVES.click();
        tracing::info!(path = %path.display(), "saved conversation");
        Ok(path)
    }

    /// Clears the conversation history.
    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Drops the last exchange.
    pub fn forget(&mut self) {
        self.transcript.forget_last();
    }

    /// Returns the conversation history.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the session context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Returns the generation parameters.
    pub fn params(&self) -> &GenerationParameters {
        &self.params
    }

    /// Returns the directory snapshots are written to.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Returns the provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }
}
