//! Alibaba DashScope wire format

use serde::{Deserialize, Serialize};

use crate::types::{CanonicalError, ToolCall, ToolDefinition};

// -- Request types --

/// Chat generation request
#[derive(Debug, Clone, Serialize)]
pub struct DashScopeChatRequest {
    pub model: String,
    pub input: DashScopeInput,
    pub parameters: DashScopeParameters,
}

/// Conversation sent upstream
#[derive(Debug, Clone, Serialize)]
pub struct DashScopeInput {
    pub messages: Vec<DashScopeMessage>,
}

/// One message in DashScope shape
#[derive(Debug, Clone, Serialize)]
pub struct DashScopeMessage {
    pub role: String,
    pub content: DashScopeContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Text for text models, parts for multimodal models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DashScopeContent {
    Text(String),
    Parts(Vec<DashScopePart>),
}

impl DashScopeContent {
    /// Concatenated text of the content
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts.iter().filter_map(|p| p.text.as_deref()).collect(),
        }
    }
}

/// Multimodal part: exactly one of `text` or `image` is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashScopePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Generation parameters
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashScopeParameters {
    /// Always `message`, so choices come back in chat shape
    pub result_format: String,
    /// `false` keeps streamed events cumulative
    pub incremental_output: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Text embedding request
#[derive(Debug, Clone, Serialize)]
pub struct DashScopeEmbeddingRequest {
    pub model: String,
    pub input: DashScopeEmbeddingInput,
    pub parameters: DashScopeEmbeddingParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashScopeEmbeddingInput {
    pub texts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashScopeEmbeddingParameters {
    /// `query` or `document`
    pub text_type: String,
}

// -- Response types --

/// Error fields carried inline by every DashScope response
///
/// An empty `code` means "no error"; the struct itself is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashScopeError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

impl DashScopeError {
    /// Canonical error, or `None` when no error is present
    ///
    /// The vendor code becomes the canonical type and code, the message is
    /// passed through verbatim, and the request id lands in `param`.
    pub fn normalize(&self) -> Option<CanonicalError> {
        if self.code.is_empty() {
            return None;
        }

        Some(CanonicalError {
            message: self.message.clone(),
            error_type: self.code.clone(),
            param: (!self.request_id.is_empty()).then(|| self.request_id.clone()),
            code: Some(self.code.clone()),
        })
    }
}

/// Chat generation response, also the payload of every stream event
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeChatResponse {
    #[serde(default)]
    pub output: DashScopeOutput,
    #[serde(default)]
    pub usage: DashScopeUsage,
    #[serde(flatten)]
    pub error: DashScopeError,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeOutput {
    #[serde(default)]
    pub choices: Vec<DashScopeChoice>,
    /// Output-level finish reason, used by multimodal models
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Bare text of the legacy `text` result format
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeChoice {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub message: DashScopeResponseMessage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<DashScopeContent>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Token counts; multimodal responses omit the total
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashScopeUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

/// Text embedding response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeEmbeddingResponse {
    #[serde(default)]
    pub output: DashScopeEmbeddingOutput,
    #[serde(default)]
    pub usage: DashScopeEmbeddingUsage,
    #[serde(flatten)]
    pub error: DashScopeError,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashScopeEmbeddingOutput {
    #[serde(default)]
    pub embeddings: Vec<DashScopeEmbedding>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashScopeEmbedding {
    pub embedding: Vec<f32>,
    pub text_index: usize,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DashScopeEmbeddingUsage {
    #[serde(default)]
    pub total_tokens: u32,
}

/// Parse an error body and normalize it
pub fn parse_error(body: &[u8]) -> Option<CanonicalError> {
    serde_json::from_slice::<DashScopeError>(body).ok()?.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_code_means_no_error() {
        let response: DashScopeChatResponse =
            serde_json::from_str(r#"{"output":{"choices":[]},"request_id":"abc"}"#).unwrap();

        assert!(response.error.normalize().is_none());
        assert_eq!(response.error.request_id, "abc");
    }

    #[test]
    fn normalizes_vendor_error() {
        let body = br#"{"code":"InvalidParameter","message":"Role must be user or assistant and Content length must be greater than 0","request_id":"4883ee8d-f095-94ff-a94a-5ce0a94bc81f"}"#;

        let error = parse_error(body).unwrap();
        assert_eq!(error.error_type, "InvalidParameter");
        assert_eq!(error.code.as_deref(), Some("InvalidParameter"));
        assert_eq!(
            error.message,
            "Role must be user or assistant and Content length must be greater than 0"
        );
        assert_eq!(error.param.as_deref(), Some("4883ee8d-f095-94ff-a94a-5ce0a94bc81f"));
    }

    #[test]
    fn non_json_error_body_yields_nothing() {
        assert!(parse_error(b"<html>502 Bad Gateway</html>").is_none());
    }

    #[test]
    fn multimodal_content_parts_decode() {
        let response: DashScopeChatResponse = serde_json::from_str(
            r#"{"output":{"choices":[{"message":{"role":"assistant","content":[{"text":"a cat"},{"text":" on a mat"}]}}],"finish_reason":"stop"},"usage":{"input_tokens":1279,"output_tokens":63,"image_tokens":1247}}"#,
        )
        .unwrap();

        let content = response.output.choices[0].message.content.as_ref().unwrap();
        assert_eq!(content.text(), "a cat on a mat");
        assert_eq!(response.output.finish_reason.as_deref(), Some("stop"));
        assert_eq!(response.usage.total_tokens, None);
    }
}
