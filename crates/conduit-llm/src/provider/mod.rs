//! Adapter traits and vendor implementations
//!
//! An adapter is built per outbound call from one channel's configuration.
//! The caller allocates the usage record, hands it over with
//! [`Adapter::set_usage`], and reads it once the call (or stream) is over.

pub mod ali;
pub mod openai;

use async_trait::async_trait;
use conduit_config::{ChannelConfig, ChannelType};
use conduit_core::RequestContext;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

pub use self::ali::AliProvider;
pub use self::openai::OpenAiProvider;
use crate::error::LlmError;
use crate::stream::ChunkStream;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse};
use crate::usage::UsageHandle;

/// State every adapter carries regardless of the operation
pub trait Adapter: Send + Sync {
    /// Channel name, used in logs
    fn name(&self) -> &str;

    /// Install the caller-owned usage record
    fn set_usage(&mut self, usage: UsageHandle);

    /// Usage record this adapter writes to
    fn usage(&self) -> &UsageHandle;
}

/// Chat completions against one upstream
#[async_trait]
pub trait ChatProvider: Adapter {
    /// Synchronous completion
    ///
    /// Usage is written exactly once, and only when a response is returned.
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChatCompletionResponse, LlmError>;

    /// Streamed completion
    ///
    /// Errors before the first byte are returned directly; later ones are the
    /// stream's final item. Usage is updated while the stream is consumed.
    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, LlmError>;
}

/// Text embeddings against one upstream
#[async_trait]
pub trait EmbeddingsProvider: Adapter {
    async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
        context: &RequestContext,
    ) -> Result<EmbeddingResponse, LlmError>;
}

/// Chat adapter for the channel's vendor
pub fn chat_provider(name: &str, config: &ChannelConfig) -> Box<dyn ChatProvider> {
    match config.channel_type {
        ChannelType::Ali => Box::new(AliProvider::new(name, config)),
        ChannelType::Openai => Box::new(OpenAiProvider::new(name, config)),
    }
}

/// Embeddings adapter for the channel's vendor
pub fn embeddings_provider(name: &str, config: &ChannelConfig) -> Box<dyn EmbeddingsProvider> {
    match config.channel_type {
        ChannelType::Ali => Box::new(AliProvider::new(name, config)),
        ChannelType::Openai => Box::new(OpenAiProvider::new(name, config)),
    }
}

/// Bearer auth plus the common JSON headers
///
/// Streaming calls accept an event stream instead of JSON.
pub(crate) fn bearer_headers(api_key: &SecretString, streaming: bool) -> Result<HeaderMap, LlmError> {
    let mut auth = HeaderValue::try_from(format!("Bearer {}", api_key.expose_secret()))
        .map_err(|e| LlmError::RequestConstruction(format!("invalid API key: {e}")))?;
    auth.set_sensitive(true);

    let accept = if streaming { "text/event-stream" } else { "application/json" };

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static(accept));

    Ok(headers)
}

/// Base URL without its trailing slash
pub(crate) fn base_url(config: &ChannelConfig, default: &str) -> String {
    config
        .base_url
        .as_ref()
        .map_or(default, Url::as_str)
        .trim_end_matches('/')
        .to_owned()
}
