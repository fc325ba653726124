//! OpenAI-compatible provider

use std::time::Duration;

use async_trait::async_trait;
use conduit_config::ChannelConfig;
use conduit_core::RequestContext;
use http::Method;

use super::{Adapter, ChatProvider, EmbeddingsProvider, base_url, bearer_headers};
use crate::convert::openai::{self, OpenAiStreamHandler};
use crate::error::LlmError;
use crate::protocol::openai::parse_error;
use crate::requester::Requester;
use crate::stream::{ChunkStream, StreamDecoder};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse, Usage};
use crate::usage::UsageHandle;

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Pass-through adapter for OpenAI-compatible servers
pub struct OpenAiProvider {
    name: String,
    base_url: String,
    channel: ChannelConfig,
    requester: Requester,
    usage: UsageHandle,
}

impl OpenAiProvider {
    pub fn new(name: impl Into<String>, config: &ChannelConfig) -> Self {
        let name = name.into();

        Self {
            requester: Requester::new(name.clone(), Duration::from_secs(config.timeout), parse_error),
            name,
            base_url: base_url(config, DEFAULT_BASE_URL),
            channel: config.clone(),
            usage: UsageHandle::new(),
        }
    }
}

impl Adapter for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_usage(&mut self, usage: UsageHandle) {
        self.usage = usage;
    }

    fn usage(&self) -> &UsageHandle {
        &self.usage
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChatCompletionResponse, LlmError> {
        tracing::debug!(provider = %self.name, request_id = %context.request_id, "chat completion");

        let mut body = openai::build_chat_request(request, self.channel.upstream_model(&request.model));
        body.stream = false;

        let url = format!("{}/chat/completions", self.base_url);
        let http_request = self
            .requester
            .build_request(Method::POST, &url, &body, bearer_headers(&self.channel.api_key, false)?)?;

        let response: ChatCompletionResponse = self.requester.send_json(http_request).await?;
        let response = openai::into_chat_response(response, &request.model)?;

        if let Some(usage) = response.usage {
            self.usage.overwrite(usage);
        }

        Ok(response)
    }

    async fn create_chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, LlmError> {
        tracing::debug!(provider = %self.name, request_id = %context.request_id, "streaming chat completion");

        let mut body = request.clone();
        body.stream = true;
        let body = openai::build_chat_request(&body, self.channel.upstream_model(&request.model));

        let url = format!("{}/chat/completions", self.base_url);
        let http_request = self
            .requester
            .build_request(Method::POST, &url, &body, bearer_headers(&self.channel.api_key, true)?)?;

        let response = self.requester.send_stream(http_request).await?;

        let forward_usage = request.stream_options.is_some_and(|options| options.include_usage);
        let handler = OpenAiStreamHandler::new(request.model.as_str(), self.usage.clone(), forward_usage);

        Ok(StreamDecoder::new(self.name.as_str(), handler)
            .cancel_on(context.cancellation.clone())
            .report_to(self.usage.clone())
            .decode(response.bytes_stream()))
    }
}

#[async_trait]
impl EmbeddingsProvider for OpenAiProvider {
    async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
        context: &RequestContext,
    ) -> Result<EmbeddingResponse, LlmError> {
        tracing::debug!(provider = %self.name, request_id = %context.request_id, "embeddings");

        let mut body = request.clone();
        self.channel.upstream_model(&request.model).clone_into(&mut body.model);

        let url = format!("{}/embeddings", self.base_url);
        let http_request = self
            .requester
            .build_request(Method::POST, &url, &body, bearer_headers(&self.channel.api_key, false)?)?;

        let mut response: EmbeddingResponse = self.requester.send_json(http_request).await?;
        request.model.clone_into(&mut response.model);

        self.usage.overwrite(Usage::new(response.usage.prompt_tokens, 0));

        Ok(response)
    }
}
