use serde::{Deserialize, Serialize};

use super::message::{Role, ToolCall};
use super::response::{FinishReason, Usage};

/// Object tag of a streamed chunk
pub const CHAT_COMPLETION_CHUNK_OBJECT: &str = "chat.completion.chunk";

/// One event of a canonical stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental chunk
    Chunk(ChatCompletionChunk),
    /// Upstream finished without error
    Done,
}

impl StreamEvent {
    /// Payload of the server-sent event carrying this value
    pub fn to_sse_data(&self) -> String {
        match self {
            Self::Chunk(chunk) => serde_json::to_string(chunk).unwrap_or_default(),
            Self::Done => "[DONE]".to_owned(),
        }
    }
}

/// Streamed response chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Response identifier, shared by every chunk of a stream
    pub id: String,
    /// Object tag, `chat.completion.chunk`
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model name echoed from the request
    pub model: String,
    /// Per-choice deltas
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    /// Usage, on the trailing chunk when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Delta for one choice index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChoice {
    /// Choice index
    pub index: u32,
    /// Text added since the previous chunk for this index
    pub delta: StreamDelta,
    /// Set on the terminal chunk only
    #[serde(default)]
    pub finish_reason: Option<FinishReason>,
}

/// Incremental message content
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Author role, on the first chunk of a choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}
