//! Vendor-agnostic decoder for streamed responses
//!
//! Parses the upstream body as server-sent events and hands each event's
//! data to a [`LineHandler`]. Comments, `id:`/`event:` fields and
//! keepalives never reach the handler; multi-line data fields arrive joined.
//! The handler's chunks are yielded in arrival order. A handler error is
//! yielded once and ends the stream; a clean upstream EOF yields
//! [`StreamEvent::Done`]; cancellation ends the stream silently. How the
//! stream ended is recorded on the [`UsageHandle`] given to
//! [`StreamDecoder::report_to`].

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use eventsource_stream::{EventStream, Eventsource};
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;
use crate::types::{ChatCompletionChunk, StreamEvent};
use crate::usage::{StreamOutcome, UsageHandle};

/// Canonical event stream returned by streaming adapters
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Per-stream translation state supplied by a vendor adapter
pub trait LineHandler: Send + 'static {
    /// Translate the data of one event (whitespace trimmed)
    fn handle_line(&mut self, payload: &[u8]) -> Result<Vec<ChatCompletionChunk>, LlmError>;

    /// Whether the vendor already signalled the end of generation
    fn is_finished(&self) -> bool {
        true
    }
}

/// Builder for a decoded stream
pub struct StreamDecoder<H> {
    provider: String,
    handler: H,
    cancellation: CancellationToken,
    usage: UsageHandle,
}

impl<H: LineHandler> StreamDecoder<H> {
    pub fn new(provider: impl Into<String>, handler: H) -> Self {
        Self {
            provider: provider.into(),
            handler,
            cancellation: CancellationToken::new(),
            usage: UsageHandle::new(),
        }
    }

    /// Stop reading once `token` is cancelled
    #[must_use]
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Record the stream's outcome on `usage`
    #[must_use]
    pub fn report_to(mut self, usage: UsageHandle) -> Self {
        self.usage = usage;
        self
    }

    /// Decode `body` into canonical events
    pub fn decode<S, B, E>(self, body: S) -> ChunkStream
    where
        S: Stream<Item = Result<B, E>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
        E: Display + Send + 'static,
    {
        let state = DecodeState {
            provider: self.provider,
            handler: self.handler,
            cancellation: self.cancellation,
            usage: self.usage,
            events: Box::pin(body.eventsource()),
            pending: VecDeque::new(),
            phase: Phase::Reading,
        };

        Box::pin(futures_util::stream::unfold(state, DecodeState::next_event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Reading,
    /// Upstream EOF seen; drain pending chunks, then emit `Done`
    Closing,
    Finished,
}

struct DecodeState<S, H> {
    provider: String,
    handler: H,
    cancellation: CancellationToken,
    usage: UsageHandle,
    events: Pin<Box<EventStream<S>>>,
    pending: VecDeque<ChatCompletionChunk>,
    phase: Phase,
}

impl<S, B, E, H> DecodeState<S, H>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    H: LineHandler,
{
    async fn next_event(mut self) -> Option<(Result<StreamEvent, LlmError>, Self)> {
        loop {
            if self.phase == Phase::Finished {
                return None;
            }

            if self.cancellation.is_cancelled() {
                tracing::debug!(provider = %self.provider, "stream cancelled by caller");
                self.finish(StreamOutcome::Cancelled);
                return None;
            }

            if let Some(chunk) = self.pending.pop_front() {
                return Some((Ok(StreamEvent::Chunk(chunk)), self));
            }

            if self.phase == Phase::Closing {
                let outcome = if self.handler.is_finished() {
                    StreamOutcome::Completed
                } else {
                    tracing::warn!(
                        provider = %self.provider,
                        "upstream closed the stream before a terminal event, usage may be incomplete"
                    );
                    StreamOutcome::Truncated
                };
                self.finish(outcome);
                return Some((Ok(StreamEvent::Done), self));
            }

            let next = tokio::select! {
                biased;
                () = self.cancellation.cancelled() => continue,
                next = self.events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let chunks = match self.handler.handle_line(event.data.trim().as_bytes()) {
                        Ok(chunks) => chunks,
                        Err(e) => return Some(self.fail(e)),
                    };
                    self.pending.extend(chunks);
                }
                Some(Err(e)) => {
                    tracing::error!(provider = %self.provider, error = %e, "upstream stream broke");
                    return Some(self.fail(LlmError::Transport(e.to_string())));
                }
                None => self.phase = Phase::Closing,
            }
        }
    }

    fn finish(&mut self, outcome: StreamOutcome) {
        self.phase = Phase::Finished;
        self.usage.finish(outcome);
    }

    fn fail(mut self, error: LlmError) -> (Result<StreamEvent, LlmError>, Self) {
        tracing::warn!(provider = %self.provider, error = %error, "terminating stream with error");
        self.pending.clear();
        self.finish(StreamOutcome::Failed);
        (Err(error), self)
    }
}
