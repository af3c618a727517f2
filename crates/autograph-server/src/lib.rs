//! HTTP document store for AutoGraph diagrams
//!
//! Keeps every version of every diagram in memory and serves the endpoints
//! the offline queue replays against, plus version comparison.

pub mod handlers;
pub mod idempotency;
pub mod router;
pub mod versions;

use std::net::SocketAddr;
use std::sync::Arc;

use autograph_core::VersionDiffEngine;
use tokio::net::TcpListener;

pub use idempotency::IdempotencyLog;
pub use versions::{VersionError, VersionStore};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7891,
        }
    }
}

/// Shared state of all handlers
pub struct ServerState {
    pub diagrams: VersionStore,
    pub engine: VersionDiffEngine,
    /// Outcome of each successful write, by idempotency key
    idempotency: IdempotencyLog,
}

impl ServerState {
    pub fn new(engine: VersionDiffEngine) -> Self {
        Self {
            diagrams: VersionStore::new(),
            engine,
            idempotency: IdempotencyLog::default(),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(VersionDiffEngine::default())
    }
}

pub struct AutographServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl AutographServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind the configured address and serve until Ctrl-C.
    pub async fn start(self) -> anyhow::Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Document store listening on http://{}", listener.local_addr()?);

        let app = router::create_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                }
            })
            .await?;

        tracing::info!("Document store stopped");
        Ok(())
    }

    /// Serve on an already bound listener until the task is dropped.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        axum::serve(listener, router::create_router(self.state)).await?;
        Ok(())
    }
}
