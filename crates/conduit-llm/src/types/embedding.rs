use serde::{Deserialize, Serialize};

/// Embedding input: a single string or an array of strings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EmbedInput {
    /// Single text input
    Single(String),
    /// Multiple text inputs
    Multiple(Vec<String>),
}

impl EmbedInput {
    /// Inputs as owned strings, in request order
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::Single(text) => vec![text.clone()],
            Self::Multiple(texts) => texts.clone(),
        }
    }
}

/// Canonical embedding request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingRequest {
    /// Text(s) to embed
    pub input: EmbedInput,
    /// Model identifier
    pub model: String,
    /// Encoding format, only `float` is produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    /// Requested vector size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
}

/// One vector of the response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddingData {
    /// Always `embedding`
    pub object: String,
    /// The vector
    pub embedding: Vec<f32>,
    /// Position of the source text in the request input
    pub index: usize,
}

/// Token usage of an embedding call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmbeddingUsage {
    /// Tokens in the input
    pub prompt_tokens: u32,
    /// Same as `prompt_tokens` for embeddings
    pub total_tokens: u32,
}

/// Canonical embedding response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EmbeddingResponse {
    /// Always `list`
    pub object: String,
    /// Vectors ordered by input position
    pub data: Vec<EmbeddingData>,
    /// Model name echoed from the request
    pub model: String,
    /// Token usage
    pub usage: EmbeddingUsage,
}
