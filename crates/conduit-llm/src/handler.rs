//! Axum route handlers for the canonical endpoints

use std::convert::Infallible;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use conduit_core::RequestContext;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::DropGuard;

use crate::error::LlmError;
use crate::state::LlmState;
use crate::stream::ChunkStream;
use crate::types::{ChatCompletionRequest, EmbeddingRequest};

/// Build the LLM router
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/v1/chat/completions", routing::post(chat_completions))
        .route("/v1/embeddings", routing::post(embeddings))
        .with_state(state)
}

/// Handle `POST /v1/chat/completions`
async fn chat_completions(
    State(state): State<LlmState>,
    request: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(&LlmError::InvalidRequest(rejection.body_text())),
    };

    let context = RequestContext::new();

    if request.stream {
        match state.chat_stream(&request, &context).await {
            // Client disconnect drops the body stream, which trips the token
            Ok(stream) => stream_response(stream, context.cancellation.clone().drop_guard()).into_response(),
            Err(e) => error_response(&e),
        }
    } else {
        match state.chat(&request, &context).await {
            Ok(response) => Json(response).into_response(),
            Err(e) => error_response(&e),
        }
    }
}

/// Handle `POST /v1/embeddings`
async fn embeddings(
    State(state): State<LlmState>,
    request: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(&LlmError::InvalidRequest(rejection.body_text())),
    };

    match state.embeddings(&request, &RequestContext::new()).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Server-sent events: one `data:` event per chunk, then `[DONE]` or a
/// single error event
fn stream_response(
    stream: ChunkStream,
    cancel_on_drop: DropGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream.map(move |item| {
        let _guard = &cancel_on_drop;

        let data = match item {
            Ok(event) => event.to_sse_data(),
            Err(e) => {
                tracing::warn!(error = %e, "stream ended with error");
                serde_json::to_string(&e.to_error_with_status().body()).unwrap_or_default()
            }
        };

        Ok(Event::default().data(data))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Canonical JSON error body with the error's status
fn error_response(error: &LlmError) -> Response {
    let canonical = error.to_error_with_status();
    (canonical.status, Json(canonical.body())).into_response()
}
