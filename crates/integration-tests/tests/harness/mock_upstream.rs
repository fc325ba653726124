//! Mock vendor upstream for integration tests
//!
//! Answers every request with one canned reply and records what it received,
//! so tests can assert on the translated wire request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::stream;
use tokio_util::sync::CancellationToken;

/// Reply the mock sends for every request
#[derive(Debug, Clone)]
pub struct Canned {
    status: StatusCode,
    content_type: &'static str,
    body: String,
    /// Keep the connection open after the body
    hang: bool,
}

impl Canned {
    /// 200 with a JSON body
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "application/json",
            body: body.into(),
            hang: false,
        }
    }

    /// 200 with an event-stream body
    pub fn sse(body: impl Into<String>) -> Self {
        Self {
            content_type: "text/event-stream",
            ..Self::json(body)
        }
    }

    /// Replace the status code
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Replace the content type
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    /// Never finish the body after sending it
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }
}

/// A request the mock received
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

/// Mock upstream bound on a random local port
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    reply: Canned,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockUpstream {
    /// Start the mock, answering every request with `reply`
    pub async fn start(reply: Canned) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            reply,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL without a path, as DashScope channels expect
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL with `/v1`, as OpenAI-compatible channels expect
    pub fn openai_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The only request received
    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests.into_iter().next().unwrap()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        path: uri.path().to_owned(),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = &state.reply;
    let body = if reply.hang {
        let first = stream::iter([Ok::<_, Infallible>(Bytes::from(reply.body.clone()))]);
        Body::from_stream(futures_util::StreamExt::chain(first, stream::pending()))
    } else {
        Body::from(reply.body.clone())
    };

    (reply.status, [(CONTENT_TYPE, reply.content_type)], body).into_response()
}
