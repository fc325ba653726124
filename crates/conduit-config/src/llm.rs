use std::collections::HashMap;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Seconds an upstream call may take before the transport gives up
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Upstream channel configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Channels keyed by name, in declaration order
    #[serde(default)]
    pub channels: IndexMap<String, ChannelConfig>,
}

impl LlmConfig {
    /// First channel that serves `model`, with its name
    pub fn channel_for(&self, model: &str) -> Option<(&str, &ChannelConfig)> {
        self.channels
            .iter()
            .find(|(_, channel)| channel.serves(model))
            .map(|(name, channel)| (name.as_str(), channel))
    }
}

/// One upstream account: vendor, credentials and the models it serves
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Vendor protocol spoken by this channel
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    /// Credential sent as a bearer token
    pub api_key: SecretString,
    /// Base URL override; the vendor default applies when absent
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Canonical model names routed to this channel
    #[serde(default)]
    pub models: Vec<String>,
    /// Canonical model name to upstream model name
    #[serde(default)]
    pub model_mapping: HashMap<String, String>,
    /// DashScope plugin header value
    #[serde(default)]
    pub plugin: Option<String>,
    /// Upstream timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl ChannelConfig {
    /// Whether this channel lists `model`
    pub fn serves(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Upstream model name for a canonical one, after mapping
    pub fn upstream_model<'a>(&'a self, model: &'a str) -> &'a str {
        self.model_mapping.get(model).map_or(model, String::as_str)
    }
}

/// Supported vendor protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    /// Alibaba DashScope
    Ali,
    /// Any OpenAI-compatible endpoint
    Openai,
}

const fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
