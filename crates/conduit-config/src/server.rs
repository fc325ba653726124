use std::net::SocketAddr;

use serde::Deserialize;

/// Address used when neither the config nor the command line sets one
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:3000";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
}
