//! Read-through cache of diagram versions for the diff view

use std::sync::Arc;

use autograph_core::{CachedDocument, CanvasDocument, DiffResult, VersionDiffEngine};

use crate::error::{FailureClass, SyncResult};
use crate::remote::DocumentStore;
use crate::store::LocalStore;

/// Fetches versions from the document store and keeps the last fetched copy
/// of each diagram in the local store, for use while offline.
pub struct DocumentCache {
    store: Arc<dyn LocalStore>,
    remote: Arc<dyn DocumentStore>,
}

impl DocumentCache {
    pub fn new(store: Arc<dyn LocalStore>, remote: Arc<dyn DocumentStore>) -> Self {
        Self { store, remote }
    }

    /// Fetch a version. A successful fetch replaces the cached copy; when the
    /// store is unreachable the cached copy is used if it holds that version.
    pub async fn load(&self, diagram_id: &str, version: u64) -> SyncResult<CanvasDocument> {
        match self.remote.fetch_version(diagram_id, version).await {
            Ok(document) => {
                let cached = CachedDocument::new(diagram_id, Some(version), document.clone());
                self.store.put_document(&cached)?;
                tracing::debug!("Cached version {} of {}", version, diagram_id);
                Ok(document)
            }
            Err(err) if err.class() == FailureClass::Transient => {
                match self.store.get_document(diagram_id)? {
                    Some(cached) if cached.holds(version) => {
                        tracing::warn!(
                            "Using cached version {} of {} ({}); cached {}s ago",
                            version,
                            diagram_id,
                            err,
                            cached.age().num_seconds()
                        );
                        Ok(cached.document)
                    }
                    _ => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load two versions and diff them.
    pub async fn compare(
        &self,
        engine: &VersionDiffEngine,
        diagram_id: &str,
        from: u64,
        to: u64,
    ) -> SyncResult<DiffResult> {
        let v1 = self.load(diagram_id, from).await?;
        let v2 = self.load(diagram_id, to).await?;
        Ok(engine.compare(&v1, &v2))
    }

    pub fn cached(&self, diagram_id: &str) -> SyncResult<Option<CachedDocument>> {
        Ok(self.store.get_document(diagram_id)?)
    }

    pub fn invalidate(&self, diagram_id: &str) -> SyncResult<()> {
        Ok(self.store.delete_document(diagram_id)?)
    }
}
