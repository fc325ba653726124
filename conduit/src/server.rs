use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use conduit_config::{Config, DEFAULT_LISTEN_ADDRESS};
use conduit_llm::{LlmState, llm_router};
use tokio_util::sync::CancellationToken;

/// HTTP server exposing the canonical endpoints
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server; `listen` overrides the configured address
    pub fn new(config: Config, listen: Option<SocketAddr>) -> anyhow::Result<Self> {
        let listen_address = match listen.or(config.server.listen_address) {
            Some(address) => address,
            None => DEFAULT_LISTEN_ADDRESS
                .parse()
                .context("invalid default listen address")?,
        };

        tracing::info!(
            channels = config.llm.channels.len(),
            "llm channels configured"
        );

        let router = llm_router(LlmState::new(config.llm));

        Ok(Self { router, listen_address })
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address)
            .await
            .with_context(|| format!("failed to bind {}", self.listen_address))?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}
