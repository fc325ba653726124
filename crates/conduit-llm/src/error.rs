use conduit_core::HttpError;
use http::StatusCode;
use thiserror::Error;

use crate::types::{CanonicalError, ErrorWithStatus, wrap_error};

/// Errors surfaced by adapters and the stream decoder
///
/// None of these are retried here. Retrying or failing over is the
/// caller's decision, since a repeated request would double-count usage.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The outbound request could not be built (bad URL, header, or body)
    #[error("failed to build upstream request: {0}")]
    RequestConstruction(String),

    /// The upstream could not be reached or the connection broke
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// The upstream answered with something that does not decode
    #[error("failed to decode upstream response: {0}")]
    MalformedResponse(String),

    /// The upstream reported a structured error
    #[error("{}", .0.error.message)]
    Vendor(ErrorWithStatus),

    /// Client sent a request this gateway cannot serve
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No configured channel serves the requested model
    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Vendor-reported semantic error, answered with 400
    pub const fn vendor(error: CanonicalError) -> Self {
        Self::Vendor(ErrorWithStatus {
            error,
            status: StatusCode::BAD_REQUEST,
        })
    }

    /// Canonical error and status for this failure
    pub fn to_error_with_status(&self) -> ErrorWithStatus {
        match self {
            Self::Vendor(vendor) => vendor.clone(),
            other => {
                let mut wrapped = wrap_error(other.client_message(), other.code(), other.status_code());
                other.error_type().clone_into(&mut wrapped.error.error_type);
                wrapped
            }
        }
    }

    /// Stable code of a local failure
    const fn code(&self) -> &'static str {
        match self {
            Self::RequestConstruction(_) => "new_request_failed",
            Self::Transport(_) => "http_request_failed",
            Self::MalformedResponse(_) => "decode_response_failed",
            Self::Vendor(_) => "upstream_error",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ModelNotFound { .. } => "model_not_found",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl HttpError for LlmError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Vendor(vendor) => vendor.status,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            Self::RequestConstruction(_) | Self::Transport(_) | Self::MalformedResponse(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Vendor(vendor) => &vendor.error.error_type,
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::ModelNotFound { .. } => "not_found_error",
            Self::RequestConstruction(_) | Self::Transport(_) | Self::MalformedResponse(_) | Self::Internal(_) => {
                crate::types::error::GATEWAY_ERROR_TYPE
            }
        }
    }

    fn error_code(&self) -> Option<&str> {
        match self {
            Self::Vendor(vendor) => vendor.error.code.as_deref(),
            other => Some(other.code()),
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            other => other.to_string(),
        }
    }
}
