//! Stand-in store used when no remote is configured

use async_trait::async_trait;
use autograph_core::CanvasDocument;

use super::DocumentStore;
use crate::edit::PendingEdit;
use crate::error::RemoteError;

/// Reports every call as a transient failure, so edits stay queued until a
/// real store is configured.
pub struct OfflineStore;

impl OfflineStore {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OfflineStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for OfflineStore {
    async fn fetch_version(&self, diagram_id: &str, version: u64) -> Result<CanvasDocument, RemoteError> {
        Err(RemoteError::Transient(format!(
            "offline: cannot fetch version {} of {}",
            version, diagram_id
        )))
    }

    async fn apply(&self, edit: &PendingEdit) -> Result<(), RemoteError> {
        Err(RemoteError::Transient(format!("offline: {} kept queued", edit.id)))
    }

    fn name(&self) -> &str {
        "Offline"
    }
}
