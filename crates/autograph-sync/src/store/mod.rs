//! Local durable storage for pending edits and cached documents

pub mod memory;
pub mod file;

use autograph_core::CachedDocument;

use crate::edit::PendingEdit;
use crate::error::StoreResult;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key-value persistence with two tables: pending edits (keyed by edit id,
/// indexed by diagram and enqueue order) and cached documents (keyed by
/// diagram id). Every method is atomic.
pub trait LocalStore: Send + Sync {
    fn put_edit(&self, edit: &PendingEdit) -> StoreResult<()>;

    fn get_edit(&self, id: &str) -> StoreResult<Option<PendingEdit>>;

    /// All pending edits, ordered by enqueue sequence.
    fn all_edits(&self) -> StoreResult<Vec<PendingEdit>>;

    /// Pending edits of one diagram, ordered by enqueue sequence.
    fn edits_for_diagram(&self, diagram_id: &str) -> StoreResult<Vec<PendingEdit>> {
        Ok(self
            .all_edits()?
            .into_iter()
            .filter(|edit| edit.diagram_id == diagram_id)
            .collect())
    }

    fn delete_edit(&self, id: &str) -> StoreResult<()>;

    fn clear_edits(&self) -> StoreResult<()>;

    fn put_document(&self, document: &CachedDocument) -> StoreResult<()>;

    fn get_document(&self, diagram_id: &str) -> StoreResult<Option<CachedDocument>>;

    fn delete_document(&self, diagram_id: &str) -> StoreResult<()>;

    fn clear_documents(&self) -> StoreResult<()>;
}

/// Order edits the way every store must return them.
pub(crate) fn sort_by_seq(edits: &mut [PendingEdit]) {
    edits.sort_by(|a, b| a.seq.cmp(&b.seq).then_with(|| a.enqueued_at.cmp(&b.enqueued_at)));
}
