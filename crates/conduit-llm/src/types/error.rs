use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Value of `type` for failures that originate inside the gateway
pub const GATEWAY_ERROR_TYPE: &str = "conduit_error";

/// Canonical error payload
///
/// Built once per failed call or failed stream event and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalError {
    /// Human-readable message, vendor text is kept verbatim
    pub message: String,
    /// Error category; the vendor code for vendor-reported failures
    #[serde(rename = "type")]
    pub error_type: String,
    /// Extra locator; the vendor request id for vendor-reported failures
    #[serde(default)]
    pub param: Option<String>,
    /// Stable code
    #[serde(default)]
    pub code: Option<String>,
}

/// JSON body `{"error": {...}}` returned to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: CanonicalError,
}

/// Canonical error plus the HTTP status the gateway answers with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorWithStatus {
    pub error: CanonicalError,
    pub status: StatusCode,
}

impl ErrorWithStatus {
    /// Body to serialize for the client
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error.clone(),
        }
    }
}

impl fmt::Display for ErrorWithStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error.error_type, self.status.as_u16(), self.error.message)
    }
}

/// Wrap a local failure (transport, encoding, construction) with a code and status
pub fn wrap_error(err: impl fmt::Display, code: &str, status: StatusCode) -> ErrorWithStatus {
    ErrorWithStatus {
        error: CanonicalError {
            message: err.to_string(),
            error_type: GATEWAY_ERROR_TYPE.to_owned(),
            param: None,
            code: Some(code.to_owned()),
        },
        status,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn wrap_error_keeps_message_and_code() {
        let wrapped = wrap_error("connection refused", "http_request_failed", StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(wrapped.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::to_value(wrapped.body()).unwrap(),
            json!({
                "error": {
                    "message": "connection refused",
                    "type": "conduit_error",
                    "param": null,
                    "code": "http_request_failed"
                }
            })
        );
    }
}
