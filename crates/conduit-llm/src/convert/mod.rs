//! Conversion between canonical types and vendor wire formats
//!
//! Each submodule covers one vendor: request translation, synchronous
//! response translation, and the per-line stream handler.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod dashscope;
pub mod openai;

/// Seconds since the Unix epoch, for vendors that do not report a creation time
pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
