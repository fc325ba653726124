//! Canonical <-> OpenAI-compatible conversion
//!
//! The vendor speaks the canonical format already, so translation is mostly
//! model renaming. Its stream is incremental and needs no delta tracking.

use crate::error::LlmError;
use crate::protocol::openai::OpenAiStreamPayload;
use crate::stream::LineHandler;
use crate::types::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, StreamOptions};
use crate::usage::UsageHandle;

/// Payload that ends an OpenAI stream
const DONE_PAYLOAD: &[u8] = b"[DONE]";

/// Outbound request for `upstream_model`
///
/// Streaming requests always ask for the trailing usage chunk; it is what
/// feeds the usage handle.
pub fn build_chat_request(request: &ChatCompletionRequest, upstream_model: &str) -> ChatCompletionRequest {
    let mut outbound = request.clone();
    upstream_model.clone_into(&mut outbound.model);

    if outbound.stream {
        outbound.stream_options = Some(StreamOptions { include_usage: true });
    }

    outbound
}

/// Synchronous response with the requested model name restored
pub fn into_chat_response(mut response: ChatCompletionResponse, model: &str) -> Result<ChatCompletionResponse, LlmError> {
    if response.choices.is_empty() {
        return Err(LlmError::MalformedResponse("response carried no choices".to_owned()));
    }

    model.clone_into(&mut response.model);
    Ok(response)
}

/// Per-stream handler for OpenAI-compatible events
pub struct OpenAiStreamHandler {
    model: String,
    usage: UsageHandle,
    /// Whether the client itself asked for the usage chunk
    forward_usage: bool,
    finished: bool,
}

impl OpenAiStreamHandler {
    pub fn new(model: impl Into<String>, usage: UsageHandle, forward_usage: bool) -> Self {
        Self {
            model: model.into(),
            usage,
            forward_usage,
            finished: false,
        }
    }
}

impl LineHandler for OpenAiStreamHandler {
    fn handle_line(&mut self, payload: &[u8]) -> Result<Vec<ChatCompletionChunk>, LlmError> {
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        if payload == DONE_PAYLOAD {
            self.finished = true;
            return Ok(Vec::new());
        }

        let payload: OpenAiStreamPayload = serde_json::from_slice(payload).map_err(|e| {
            tracing::error!(provider = "openai", error = %e, "failed to decode stream event");
            LlmError::MalformedResponse(e.to_string())
        })?;

        let mut chunk = match payload {
            OpenAiStreamPayload::Error(response) => return Err(LlmError::vendor(response.error.normalize())),
            OpenAiStreamPayload::Chunk(chunk) => chunk,
        };

        if let Some(usage) = chunk.usage {
            self.usage.overwrite(usage);
        }

        if !self.forward_usage {
            if chunk.choices.is_empty() {
                return Ok(Vec::new());
            }
            chunk.usage = None;
        }

        self.model.clone_into(&mut chunk.model);
        Ok(vec![chunk])
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Role, Usage};

    const CHUNK: &[u8] = br#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4o-mini-2024-07-18","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#;
    const USAGE_CHUNK: &[u8] = br#"{"id":"c1","object":"chat.completion.chunk","created":1,"model":"gpt-4o-mini-2024-07-18","choices":[],"usage":{"prompt_tokens":9,"completion_tokens":2,"total_tokens":11}}"#;

    #[test]
    fn streaming_request_asks_for_usage() {
        let mut request = ChatCompletionRequest::new("fast", vec![Message::text(Role::User, "hi")]);
        request.stream = true;

        let outbound = build_chat_request(&request, "gpt-4o-mini");
        assert_eq!(outbound.model, "gpt-4o-mini");
        assert_eq!(outbound.stream_options, Some(StreamOptions { include_usage: true }));

        request.stream = false;
        assert_eq!(build_chat_request(&request, "gpt-4o-mini").stream_options, None);
    }

    #[test]
    fn usage_chunk_is_recorded_but_hidden_unless_requested() {
        let usage = UsageHandle::new();
        let mut handler = OpenAiStreamHandler::new("fast", usage.clone(), false);

        let chunks = handler.handle_line(CHUNK).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].model, "fast");

        assert!(handler.handle_line(USAGE_CHUNK).unwrap().is_empty());
        assert_eq!(usage.snapshot(), Usage::new(9, 2));

        assert!(!handler.is_finished());
        assert!(handler.handle_line(b"[DONE]").unwrap().is_empty());
        assert!(handler.is_finished());
    }

    #[test]
    fn usage_chunk_is_forwarded_when_requested() {
        let mut handler = OpenAiStreamHandler::new("fast", UsageHandle::new(), true);

        let chunks = handler.handle_line(USAGE_CHUNK).unwrap();
        assert_eq!(chunks[0].usage, Some(Usage::new(9, 2)));
    }

    #[test]
    fn error_event_terminates() {
        let mut handler = OpenAiStreamHandler::new("fast", UsageHandle::new(), false);

        let err = handler
            .handle_line(br#"{"error":{"message":"The server had an error","type":"server_error","param":null,"code":null}}"#)
            .unwrap_err();

        assert!(matches!(err, LlmError::Vendor(ref v) if v.error.error_type == "server_error"));
    }
}
