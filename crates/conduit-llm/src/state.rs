//! Channel resolution and per-request adapter wiring

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use conduit_config::{ChannelConfig, LlmConfig};
use conduit_core::RequestContext;
use futures_util::Stream;

use crate::error::LlmError;
use crate::provider::{chat_provider, embeddings_provider};
use crate::stream::ChunkStream;
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, EmbeddingRequest, EmbeddingResponse, StreamEvent};
use crate::usage::{StreamOutcome, UsageHandle};

/// Shared state for the LLM route handlers
#[derive(Clone)]
pub struct LlmState {
    config: Arc<LlmConfig>,
}

impl LlmState {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// First channel listing `model`
    fn channel(&self, model: &str) -> Result<(&str, &ChannelConfig), LlmError> {
        self.config.channel_for(model).ok_or_else(|| {
            tracing::warn!(model, "no channel serves the requested model");
            LlmError::ModelNotFound {
                model: model.to_owned(),
            }
        })
    }

    /// Synchronous chat completion through the model's channel
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` when no channel lists the model, otherwise
    /// whatever the adapter reports. Nothing is retried.
    pub async fn chat(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChatCompletionResponse, LlmError> {
        let (name, channel) = self.channel(&request.model)?;

        let mut provider = chat_provider(name, channel);
        provider.set_usage(UsageHandle::new());

        let response = provider.create_chat_completion(request, context).await?;
        UsageReport::new(provider.name(), &request.model, context, provider.usage().clone()).emit();

        Ok(response)
    }

    /// Streamed chat completion through the model's channel
    ///
    /// Usage is reported once the returned stream is dropped, together with
    /// how the stream ended. A stream dropped before its end counts as
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` when no channel lists the model, or the
    /// adapter's error when the stream could not be opened.
    pub async fn chat_stream(
        &self,
        request: &ChatCompletionRequest,
        context: &RequestContext,
    ) -> Result<ChunkStream, LlmError> {
        let (name, channel) = self.channel(&request.model)?;

        let mut provider = chat_provider(name, channel);
        provider.set_usage(UsageHandle::new());

        let stream = provider.create_chat_completion_stream(request, context).await?;

        Ok(Box::pin(ReportedStream {
            inner: stream,
            report: UsageReport::new(provider.name(), &request.model, context, provider.usage().clone()),
        }))
    }

    /// Embeddings through the model's channel
    ///
    /// # Errors
    ///
    /// Same as [`LlmState::chat`].
    pub async fn embeddings(
        &self,
        request: &EmbeddingRequest,
        context: &RequestContext,
    ) -> Result<EmbeddingResponse, LlmError> {
        let (name, channel) = self.channel(&request.model)?;

        let mut provider = embeddings_provider(name, channel);
        provider.set_usage(UsageHandle::new());

        let response = provider.create_embeddings(request, context).await?;
        UsageReport::new(provider.name(), &request.model, context, provider.usage().clone()).emit();

        Ok(response)
    }
}

/// Usage read back from the handle once a call is over
struct UsageReport {
    channel: String,
    model: String,
    request_id: String,
    usage: UsageHandle,
}

impl UsageReport {
    fn new(channel: &str, model: &str, context: &RequestContext, usage: UsageHandle) -> Self {
        Self {
            channel: channel.to_owned(),
            model: model.to_owned(),
            request_id: context.request_id.clone(),
            usage,
        }
    }

    fn emit(&self) {
        let usage = self.usage.snapshot();
        let outcome = self.usage.outcome();
        tracing::info!(
            channel = %self.channel,
            model = %self.model,
            request_id = %self.request_id,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            outcome = outcome.map(StreamOutcome::as_str),
            complete = outcome.is_none_or(StreamOutcome::is_complete),
            "usage recorded"
        );
    }
}

/// Stream that reports usage when dropped
struct ReportedStream {
    inner: ChunkStream,
    report: UsageReport,
}

impl Stream for ReportedStream {
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for ReportedStream {
    fn drop(&mut self) {
        self.report.usage.finish(StreamOutcome::Cancelled);
        self.report.emit();
    }
}
