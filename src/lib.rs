// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod provider;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;
pub mod utils;

// Re-exports
pub use client::OpenAI;
pub use error::{Error, ErrorKind, Result};
pub use observability::{init_tracing, register_biometrics};
pub use provider::{CompletionProvider, FragmentStream, ScriptedProvider};
pub use render::{BufferRenderer, ChannelRenderer, PlainTextRenderer, Renderer, SignalSwitch};
pub use transport::{
    ACK, Exchange, MemoryChannel, MemoryClient, RemoteClient, RemoteRequest, RequestChannel,
    UnixSocketChannel,
};
pub use types::*;
