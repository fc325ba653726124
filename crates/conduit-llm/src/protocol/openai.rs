//! OpenAI-compatible wire format
//!
//! Requests and successful responses already match the canonical types, so
//! only the error envelope and the stream payload need their own shapes.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{CanonicalError, ChatCompletionChunk};

/// Error response body
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiErrorResponse {
    pub error: OpenAiErrorDetail,
}

/// Error detail; `param` and `code` vary in type across compatible servers
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub param: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
}

impl OpenAiErrorDetail {
    pub fn normalize(&self) -> CanonicalError {
        CanonicalError {
            message: self.message.clone(),
            error_type: self
                .error_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "upstream_error".to_owned()),
            param: self.param.as_ref().and_then(scalar_to_string),
            code: self.code.as_ref().and_then(scalar_to_string),
        }
    }
}

/// Data payload of a stream event
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OpenAiStreamPayload {
    /// Mid-stream failure
    Error(OpenAiErrorResponse),
    /// Regular chunk
    Chunk(ChatCompletionChunk),
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse an error body and normalize it
pub fn parse_error(body: &[u8]) -> Option<CanonicalError> {
    serde_json::from_slice::<OpenAiErrorResponse>(body)
        .ok()
        .map(|response| response.error.normalize())
}
