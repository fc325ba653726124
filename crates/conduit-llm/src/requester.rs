//! Outbound HTTP seam shared by every adapter
//!
//! Adapters describe a request (method, URL, body, headers); the
//! [`Requester`] builds it, sends it, checks the status, and turns failures
//! into [`LlmError`] values. Swapping the transport means swapping the
//! `reqwest::Client` handed to [`Requester::with_client`].

use std::sync::OnceLock;
use std::time::Duration;

use http::header::{CONTENT_TYPE, HeaderMap};
use http::{Method, StatusCode};
use reqwest::{Client, Request, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::LlmError;
use crate::types::{CanonicalError, ErrorWithStatus};

/// Vendor-specific parser for error bodies
pub type ErrorParser = fn(&[u8]) -> Option<CanonicalError>;

/// Connection-pooling client shared by all adapters
pub fn http_client() -> Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| {
            Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .pool_idle_timeout(Some(Duration::from_secs(90)))
                .tcp_nodelay(true)
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .build()
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "falling back to a default HTTP client");
                    Client::new()
                })
        })
        .clone()
}

/// Request builder and sender bound to one provider
#[derive(Debug, Clone)]
pub struct Requester {
    provider: String,
    client: Client,
    timeout: Duration,
    parse_error: ErrorParser,
}

impl Requester {
    /// Requester using the shared client
    pub fn new(provider: impl Into<String>, timeout: Duration, parse_error: ErrorParser) -> Self {
        Self {
            provider: provider.into(),
            client: http_client(),
            timeout,
            parse_error,
        }
    }

    /// Use a different transport
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Build a ready-to-send request with a JSON body
    ///
    /// Fails with [`LlmError::RequestConstruction`] when the URL is invalid
    /// or the body cannot be serialized.
    pub fn build_request<B>(&self, method: Method, url: &str, body: &B, headers: HeaderMap) -> Result<Request, LlmError>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .request(method, url)
            .headers(headers)
            .timeout(self.timeout)
            .json(body)
            .build()
            .map_err(|e| {
                tracing::error!(provider = %self.provider, error = %e, "failed to build upstream request");
                LlmError::RequestConstruction(e.to_string())
            })
    }

    /// Send a request and require a success status
    pub async fn send(&self, request: Request) -> Result<Response, LlmError> {
        tracing::debug!(provider = %self.provider, url = %request.url(), "sending upstream request");

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "upstream request failed");
            LlmError::Transport(e.to_string())
        })?;

        if !response.status().is_success() {
            return Err(self.error_from_response(response).await);
        }

        Ok(response)
    }

    /// Send a request and decode the JSON body
    pub async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T, LlmError> {
        let response = self.send(request).await?;

        let body = response.bytes().await.map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "failed to read upstream response");
            LlmError::Transport(e.to_string())
        })?;

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(provider = %self.provider, error = %e, "failed to decode upstream response");
            LlmError::MalformedResponse(e.to_string())
        })
    }

    /// Send a request whose success response is an event stream
    ///
    /// Some vendors answer a streaming request with a plain JSON error body
    /// and a success status; that body is normalized here instead of being
    /// handed to the stream decoder.
    pub async fn send_stream(&self, request: Request) -> Result<Response, LlmError> {
        let response = self.send(request).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if !is_json {
            return Ok(response);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        tracing::warn!(provider = %self.provider, "upstream answered a stream request with JSON");

        Err((self.parse_error)(&body).map_or_else(
            || LlmError::MalformedResponse("expected an event stream, received a JSON body".to_owned()),
            LlmError::vendor,
        ))
    }

    /// Normalize a non-2xx response
    async fn error_from_response(&self, response: Response) -> LlmError {
        let status = response.status();
        let body = response.bytes().await.unwrap_or_default();

        tracing::warn!(provider = %self.provider, status = %status, "upstream returned error status");

        let error = (self.parse_error)(&body).unwrap_or_else(|| bad_status_error(status));

        LlmError::Vendor(ErrorWithStatus { error, status })
    }
}

/// Fallback when an error body is not in the vendor's format
fn bad_status_error(status: StatusCode) -> CanonicalError {
    CanonicalError {
        message: format!("bad response status code {}", status.as_u16()),
        error_type: "upstream_error".to_owned(),
        param: Some(status.as_u16().to_string()),
        code: Some("bad_response_status_code".to_owned()),
    }
}
