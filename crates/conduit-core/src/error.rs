use http::StatusCode;

/// Failure that knows how it should look on the wire
///
/// Adapter crates describe their errors through this trait; the HTTP layer
/// turns it into a `{"error": {...}}` body without depending on the domain.
pub trait HttpError: std::error::Error {
    /// Status the gateway answers with
    fn status_code(&self) -> StatusCode;

    /// Value of the `type` field (e.g. `upstream_error`, or a vendor code)
    fn error_type(&self) -> &str;

    /// Value of the `code` field, when the failure has a stable one
    fn error_code(&self) -> Option<&str> {
        None
    }

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}
