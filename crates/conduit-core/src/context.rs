use tokio_util::sync::CancellationToken;

/// Per-request state handed to every adapter call
///
/// The cancellation token is tripped by the HTTP layer when the client goes
/// away; long-running reads (streams) select on it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Identifier used to correlate log lines for one inbound request
    pub request_id: String,
    /// Cancelled when the caller no longer wants the result
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Fresh context with a random request id and its own token
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Context bound to an existing cancellation token
    pub fn with_cancellation(cancellation: CancellationToken) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            cancellation,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_unique() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(a.request_id.len(), 32);
    }

    #[test]
    fn cancellation_is_shared_with_clones() {
        let context = RequestContext::new();
        let clone = context.clone();

        assert!(!clone.cancellation.is_cancelled());
        context.cancellation.cancel();
        assert!(clone.cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn child_token_follows_parent() {
        let parent = CancellationToken::new();
        let context = RequestContext::with_cancellation(parent.child_token());

        parent.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), context.cancellation.cancelled())
            .await
            .unwrap();
    }
}
