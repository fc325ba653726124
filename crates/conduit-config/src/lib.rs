#![allow(clippy::must_use_candidate)]

mod env;
pub mod llm;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use env::ExpandError;
pub use llm::*;
pub use server::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level conduit configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Upstream channels
    #[serde(default)]
    pub llm: LlmConfig,
    /// Log output configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
