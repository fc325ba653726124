//! Programmatic configuration for integration tests

use std::collections::HashMap;

use conduit_config::{ChannelConfig, ChannelType, Config};
use secrecy::SecretString;
use url::Url;

/// API key every test channel sends
pub const TEST_API_KEY: &str = "sk-test";

/// Channel of `channel_type` pointed at a mock upstream
pub fn channel(channel_type: ChannelType, base_url: &str, models: &[&str]) -> ChannelConfig {
    ChannelConfig {
        channel_type,
        api_key: SecretString::from(TEST_API_KEY),
        base_url: Some(Url::parse(base_url).unwrap()),
        models: models.iter().map(|m| (*m).to_owned()).collect(),
        model_mapping: HashMap::new(),
        plugin: None,
        timeout: 10,
    }
}

/// DashScope channel pointed at a mock upstream
pub fn ali_channel(base_url: &str, models: &[&str]) -> ChannelConfig {
    channel(ChannelType::Ali, base_url, models)
}

/// OpenAI-compatible channel pointed at a mock upstream
pub fn openai_channel(base_url: &str, models: &[&str]) -> ChannelConfig {
    channel(ChannelType::Openai, base_url, models)
}

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Add a channel under `name`
    pub fn with_channel(mut self, name: &str, channel: ChannelConfig) -> Self {
        self.config.llm.channels.insert(name.to_owned(), channel);
        self
    }

    pub fn build(self) -> Config {
        self.config.validate().unwrap();
        self.config
    }
}
