//! The streaming generation capability consumed by a chat session.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use futures::Stream;
use futures::stream;

use crate::types::ChatCompletionRequest;
use crate::{Error, Result};

/// An ordered, finite sequence of content fragments.
///
/// The stream ends when the provider signals completion.  An `Err` item means
/// the response will never complete; consumers stop reading at the first one.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A provider of streamed chat completions.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Starts a streaming completion for the request.
    ///
    /// Errors returned here (rather than from the stream) mean the provider
    /// rejected the request before producing any output.
    async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<FragmentStream>;
}

#[async_trait::async_trait]
impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<FragmentStream> {
        (**self).stream_completion(request).await
    }
}

/// One scripted response.
enum Reply {
    Fragments(Vec<Result<String>>),
    Reject(Error),
}

/// A provider that replays canned responses in order.
///
/// Each call to [`CompletionProvider::stream_completion`] consumes the next
/// scripted reply and records the request it was given.  Useful for driving a
/// session without a network.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
}

impl ScriptedProvider {
    /// Creates a provider with no replies queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply that streams `fragments` and then completes.
    pub fn reply<I, S>(self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fragments = fragments.into_iter().map(|f| Ok(f.into())).collect();
        self.push(Reply::Fragments(fragments))
    }

    /// Queues a reply that streams `fragments` and then fails with `error`.
    pub fn fail_after<I, S>(self, fragments: I, error: Error) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fragments: Vec<Result<String>> =
            fragments.into_iter().map(|f| Ok(f.into())).collect();
        fragments.push(Err(error));
        self.push(Reply::Fragments(fragments))
    }

    /// Queues a reply that is rejected before any output.
    pub fn reject(self, error: Error) -> Self {
        self.push(Reply::Reject(error))
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        lock(&self.requests).clone()
    }

    fn push(self, reply: Reply) -> Self {
        lock(&self.replies).push_back(reply);
        self
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn stream_completion(&self, request: ChatCompletionRequest) -> Result<FragmentStream> {
        lock(&self.requests).push(request);
        match lock(&self.replies).pop_front() {
            Some(Reply::Fragments(fragments)) => Ok(Box::pin(stream::iter(fragments))),
            Some(Reply::Reject(err)) => Err(err),
            None => Err(Error::api(500, None, "no scripted reply left", None)),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
