//! Prompt assembly.

use crate::chat::context::Context;
use crate::chat::transcript::Transcript;
use crate::types::Message;

/// Builds the message list for a new utterance.
///
/// The list is the context (as a system message, when not blank), then the
/// transcript in stored order, then the utterance as a user message.  The
/// utterance is also appended to `transcript` before this returns, so it
/// stays recorded even if the request that follows fails.
pub fn assemble(context: &Context, transcript: &mut Transcript, utterance: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(transcript.len() + 2);
    if let Some(system) = context.system_text() {
        messages.push(Message::system(system));
    }
    messages.extend(transcript.messages().iter().cloned());
    let prompt = Message::user(utterance);
    messages.push(prompt.clone());
    transcript.append(prompt);
    messages
}
