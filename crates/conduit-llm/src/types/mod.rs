//! Canonical request/response types
//!
//! These mirror the public wire format clients speak; every vendor adapter
//! translates to and from them.

pub mod embedding;
pub mod error;
pub mod message;
pub mod request;
pub mod response;
pub mod stream;
pub mod tool;

pub use embedding::{EmbedInput, EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};
pub use error::{CanonicalError, ErrorBody, ErrorWithStatus, wrap_error};
pub use message::{Content, ContentPart, FunctionCall, ImageUrl, Message, Role, ToolCall};
pub use request::{ChatCompletionRequest, CompletionParams, StopSequences, StreamOptions};
pub use response::{CHAT_COMPLETION_OBJECT, ChatCompletionResponse, Choice, ChoiceMessage, FinishReason, Usage};
pub use stream::{CHAT_COMPLETION_CHUNK_OBJECT, ChatCompletionChunk, StreamChoice, StreamDelta, StreamEvent};
pub use tool::{FunctionDefinition, ToolDefinition};
