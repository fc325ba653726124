//! Provider adapters and stream normalization for conduit
//!
//! Translates canonical chat and embedding requests into vendor wire
//! requests, and vendor responses (synchronous or streamed) back into the
//! canonical shape. Token usage is handed back through a caller-owned
//! [`UsageHandle`]; vendor failures are normalized into [`LlmError`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
#[cfg(feature = "http")]
mod handler;
pub mod protocol;
pub mod provider;
pub mod requester;
pub mod state;
pub mod stream;
pub mod types;
pub mod usage;

pub use error::LlmError;
#[cfg(feature = "http")]
pub use handler::llm_router;
pub use provider::{Adapter, ChatProvider, EmbeddingsProvider, chat_provider, embeddings_provider};
pub use state::LlmState;
pub use stream::{ChunkStream, LineHandler, StreamDecoder};
pub use types::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, StreamEvent, Usage};
pub use usage::{StreamOutcome, UsageHandle};
