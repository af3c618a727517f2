//! Remote document store implementations

pub mod http;
pub mod offline;

use async_trait::async_trait;
use autograph_core::CanvasDocument;
use serde::{Deserialize, Serialize};

use crate::edit::PendingEdit;
use crate::error::RemoteError;

/// The diagram document store the queue replays against.
///
/// Replays are at-least-once: an edit may be delivered again after a crash
/// between a successful call and its removal from the local store, so the
/// store must tolerate duplicates (the HTTP store sends an idempotency key).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one version of a diagram.
    async fn fetch_version(&self, diagram_id: &str, version: u64) -> Result<CanvasDocument, RemoteError>;

    /// Apply one pending edit.
    async fn apply(&self, edit: &PendingEdit) -> Result<(), RemoteError>;

    fn name(&self) -> &str;
}

/// Connection settings for the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL; empty means no remote is configured
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            timeout_secs: 10,
        }
    }
}

/// Factory function to create the document store for a configuration
pub fn create_document_store(config: &RemoteConfig) -> anyhow::Result<Box<dyn DocumentStore>> {
    if config.base_url.trim().is_empty() {
        tracing::info!("No document store configured, edits stay queued");
        return Ok(Box::new(offline::OfflineStore::new()));
    }
    Ok(Box::new(http::HttpDocumentStore::new(config)?))
}
