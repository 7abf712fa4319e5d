// Public modules
pub mod chat_completion_chunk;
pub mod chat_completion_request;
pub mod generation_parameters;
pub mod message;

// Re-exports
pub use chat_completion_chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
pub use chat_completion_request::ChatCompletionRequest;
pub use generation_parameters::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenerationParameters,
};
pub use message::{Message, Role};
