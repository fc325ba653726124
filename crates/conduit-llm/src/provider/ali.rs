//! Alibaba DashScope provider

use std::time::Duration;

use async_trait::async_trait;
use conduit_config::ChannelConfig;
use conduit_core::RequestContext;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;

use super::{Adapter, ChatProvider, EmbeddingsProvider, base_url, bearer_headers};
use crate::convert::dashscope::{self, DashScopeModel, DashScopeStreamHandler, TEXT_EMBEDDING_PATH};
use crate::convert::unix_timestamp;
use crate::error::LlmError;
use crate::protocol::dashscope::{DashScopeChatResponse, DashScopeEmbeddingResponse, parse_error};
use crate::requester::Requester;
use crate::stream::{ChunkStream, StreamDecoder};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse, Usage};
use crate::usage::UsageHandle;

/// Default DashScope base URL
const DEFAULT_BASE_URL: &str = "https://dashscope.aliyuncs.com";

static SSE_HEADER: HeaderName = HeaderName::from_static("x-dashscope-sse");
static PLUGIN_HEADER: HeaderName = HeaderName::from_static("x-dashscope-plugin");

/// DashScope adapter bound to one channel
pub struct AliProvider {
    name: String,
    base_url: String,
    channel: ChannelConfig,
    requester: Requester,
    usage: UsageHandle,
}

impl AliProvider {
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

    /// Capabilities of the upstream model behind a canonical name
    fn resolve_model(&self, model: &str) -> DashScopeModel {
        DashScopeModel::resolve(self.channel.upstream_model(model))
    }

    /// Header set; the streaming set is a superset of the synchronous one
    fn headers(&self, streaming: bool) -> Result<HeaderMap, LlmError> {
        let mut headers = bearer_headers(&self.channel.api_key, streaming)?;

        if streaming {
            headers.insert(SSE_HEADER.clone(), HeaderValue::from_static("enable"));
        }

        if let Some(plugin) = &self.channel.plugin {
            let value = HeaderValue::try_from(plugin.as_str())
                .map_err(|e| LlmError::RequestConstruction(format!("invalid plugin header: {e}")))?;
            headers.insert(PLUGIN_HEADER.clone(), value);
        }

        Ok(headers)
    }

    fn chat_request(&self, request: &ChatCompletionRequest, streaming: bool) -> Result<reqwest::Request, LlmError> {
        let model = self.resolve_model(&request.model);
        let body = dashscope::build_chat_request(request, &model);
        let url = format!("{}{}", self.base_url, model.endpoint_path());

        tracing::debug!(
            provider = %self.name,
            model = %model.name,
            modality = ?model.modality,
            search = model.enable_search,
            streaming,
            "translated chat request"
        );

        self.requester
            .build_request(Method::POST, &url, &body, self.headers(streaming)?)
    }
}

impl Adapter for AliProvider {
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
impl ChatProvider for AliProvider {
    async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChatCompletionResponse, LlmError> {
        tracing::debug!(provider = %self.name, request_id = %context.request_id, "chat completion");

        let http_request = self.chat_request(request, false)?;
        let response: DashScopeChatResponse = self.requester.send_json(http_request).await?;

        let response = dashscope::into_chat_response(response, &request.model, unix_timestamp())?;
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

        let http_request = self.chat_request(request, true)?;
        let response = self.requester.send_stream(http_request).await?;

        let handler = DashScopeStreamHandler::new(request.model.as_str(), unix_timestamp(), self.usage.clone());

        Ok(StreamDecoder::new(self.name.as_str(), handler)
            .cancel_on(context.cancellation.clone())
            .report_to(self.usage.clone())
            .decode(response.bytes_stream()))
    }
}

#[async_trait]
impl EmbeddingsProvider for AliProvider {
    async fn create_embeddings(
        &self,
        request: &EmbeddingRequest,
        context: &RequestContext,
    ) -> Result<EmbeddingResponse, LlmError> {
        tracing::debug!(provider = %self.name, request_id = %context.request_id, "embeddings");

        let upstream = self.channel.upstream_model(&request.model);
        let body = dashscope::build_embedding_request(request, upstream);
        let url = format!("{}{TEXT_EMBEDDING_PATH}", self.base_url);

        let http_request = self
            .requester
            .build_request(Method::POST, &url, &body, self.headers(false)?)?;
        let response: DashScopeEmbeddingResponse = self.requester.send_json(http_request).await?;

        let response = dashscope::into_embedding_response(response, &request.model)?;
        self.usage.overwrite(Usage::new(response.usage.prompt_tokens, 0));

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use http::header::{ACCEPT, AUTHORIZATION};

    use super::*;
    use crate::types::{Message, Role};

    fn provider(toml_src: &str) -> AliProvider {
        let config: conduit_config::LlmConfig = toml::from_str(toml_src).unwrap();
        AliProvider::new("dashscope", &config.channels["dashscope"])
    }

    const CHANNEL: &str = r#"
        [channels.dashscope]
        type = "ali"
        api_key = "sk-ali"
        base_url = "http://127.0.0.1:9/"
        models = ["qwen-turbo", "qwen-search"]
        plugin = "{\"pdf_extracter\":{}}"

        [channels.dashscope.model_mapping]
        qwen-search = "qwen-max-internet"
    "#;

    #[test]
    fn streaming_headers_are_a_superset() {
        let provider = provider(CHANNEL);

        let sync = provider.headers(false).unwrap();
        let streaming = provider.headers(true).unwrap();

        for name in sync.keys().filter(|name| **name != ACCEPT) {
            assert_eq!(sync[name], streaming[name], "{name}");
        }
        assert_eq!(sync[AUTHORIZATION], "Bearer sk-ali");
        assert_eq!(sync[&PLUGIN_HEADER], "{\"pdf_extracter\":{}}");
        assert!(!sync.contains_key(&SSE_HEADER));
        assert_eq!(streaming[&SSE_HEADER], "enable");
        assert_eq!(streaming[ACCEPT], "text/event-stream");
    }

    #[test]
    fn mapped_model_resolves_capabilities() {
        let provider = provider(CHANNEL);
        let model = provider.resolve_model("qwen-search");

        assert_eq!(model.name, "qwen-max");
        assert!(model.enable_search);
    }

    #[test]
    fn chat_request_targets_the_model_endpoint() {
        let provider = provider(CHANNEL);
        let request = ChatCompletionRequest::new("qwen-turbo", vec![Message::text(Role::User, "hi")]);

        let http_request = provider.chat_request(&request, false).unwrap();
        assert_eq!(
            http_request.url().as_str(),
            "http://127.0.0.1:9/api/v1/services/aigc/text-generation/generation"
        );
    }
}
