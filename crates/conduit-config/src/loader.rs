use std::path::Path;

use anyhow::Context;

use crate::{ChannelType, Config};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or [`Config::parse`] fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        Self::parse(&raw)
    }

    /// Expand placeholders in raw TOML, deserialize and validate it
    ///
    /// # Errors
    ///
    /// Returns an error if a placeholder cannot be expanded, the TOML is
    /// malformed, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded = crate::env::expand_env(raw).context("config variable expansion failed")?;

        let config: Self = toml::from_str(&expanded).context("failed to parse config")?;
        config.validate()?;

        Ok(config)
    }

    /// Check that channels are usable
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistent channel
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm.channels.is_empty() {
            anyhow::bail!("at least one channel must be configured under [llm.channels]");
        }

        for (name, channel) in &self.llm.channels {
            if channel.models.is_empty() {
                anyhow::bail!("channel '{name}' does not list any models");
            }

            if let Some(unlisted) = channel.model_mapping.keys().find(|model| !channel.serves(model)) {
                anyhow::bail!("channel '{name}' maps model '{unlisted}' which is not in its models list");
            }

            if channel.plugin.is_some() && channel.channel_type != ChannelType::Ali {
                anyhow::bail!("channel '{name}': plugin is only supported on ali channels");
            }

            if channel.timeout == 0 {
                anyhow::bail!("channel '{name}': timeout must be greater than 0");
            }
        }

        Ok(())
    }
}
