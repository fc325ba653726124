//! Caller-owned usage record
//!
//! The caller allocates a [`UsageHandle`] before the call and hands a clone
//! to the adapter. The adapter is the only writer; it replaces the stored
//! value whenever the vendor reports newer cumulative counts. The caller
//! reads it once the call returned or the stream was dropped. Reading while
//! a stream is still in flight yields whatever was last written.
//!
//! Streams also record how they ended, so the caller can tell final usage
//! from usage cut short by a truncated or cancelled stream.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::types::Usage;

/// How a decoded stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Upstream closed after the vendor's terminal event
    Completed,
    /// Upstream closed before the vendor's terminal event; usage may be incomplete
    Truncated,
    /// The stream ended with an error item
    Failed,
    /// The caller cancelled or dropped the stream before its end
    Cancelled,
}

impl StreamOutcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Truncated => "truncated",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the recorded usage is the vendor's final count
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for StreamOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
struct Record {
    usage: Usage,
    outcome: Option<StreamOutcome>,
}

/// Shared slot the adapter writes the latest usage into
#[derive(Debug, Clone, Default)]
pub struct UsageHandle {
    inner: Arc<Mutex<Record>>,
}

impl UsageHandle {
    /// Zeroed record
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored value (last write wins)
    pub fn overwrite(&self, usage: Usage) {
        self.record().usage = usage;
    }

    /// Current value
    pub fn snapshot(&self) -> Usage {
        self.record().usage
    }

    /// Record how the stream ended; only the first outcome sticks
    pub fn finish(&self, outcome: StreamOutcome) {
        self.record().outcome.get_or_insert(outcome);
    }

    /// How the stream ended, `None` while it is still running or for
    /// synchronous calls
    pub fn outcome(&self) -> Option<StreamOutcome> {
        self.record().outcome
    }

    fn record(&self) -> std::sync::MutexGuard<'_, Record> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
