#![allow(dead_code)]

pub mod config;
pub mod mock_upstream;
pub mod server;

use conduit_llm::{ChunkStream, LlmError, StreamEvent};
use futures_util::StreamExt;

/// Drain a canonical stream
pub async fn collect_stream(stream: ChunkStream) -> Vec<Result<StreamEvent, LlmError>> {
    stream.collect().await
}

/// Parse `data:` payloads out of a server-sent event body
pub fn parse_sse_data(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim_start().to_owned())
        .collect()
}
