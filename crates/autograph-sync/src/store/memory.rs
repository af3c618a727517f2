//! In-memory store for tests and sessions without a data directory

use autograph_core::CachedDocument;
use dashmap::DashMap;

use super::{sort_by_seq, LocalStore};
use crate::edit::PendingEdit;
use crate::error::StoreResult;

#[derive(Debug, Default)]
pub struct MemoryStore {
    edits: DashMap<String, PendingEdit>,
    documents: DashMap<String, CachedDocument>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn put_edit(&self, edit: &PendingEdit) -> StoreResult<()> {
        self.edits.insert(edit.id.clone(), edit.clone());
        Ok(())
    }

    fn get_edit(&self, id: &str) -> StoreResult<Option<PendingEdit>> {
        Ok(self.edits.get(id).map(|entry| entry.value().clone()))
    }

    fn all_edits(&self) -> StoreResult<Vec<PendingEdit>> {
        let mut edits: Vec<_> = self.edits.iter().map(|entry| entry.value().clone()).collect();
        sort_by_seq(&mut edits);
        Ok(edits)
    }

    fn delete_edit(&self, id: &str) -> StoreResult<()> {
        self.edits.remove(id);
        Ok(())
    }

    fn clear_edits(&self) -> StoreResult<()> {
        self.edits.clear();
        Ok(())
    }

    fn put_document(&self, document: &CachedDocument) -> StoreResult<()> {
        self.documents.insert(document.diagram_id.clone(), document.clone());
        Ok(())
    }

    fn get_document(&self, diagram_id: &str) -> StoreResult<Option<CachedDocument>> {
        Ok(self.documents.get(diagram_id).map(|entry| entry.value().clone()))
    }

    fn delete_document(&self, diagram_id: &str) -> StoreResult<()> {
        self.documents.remove(diagram_id);
        Ok(())
    }

    fn clear_documents(&self) -> StoreResult<()> {
        self.documents.clear();
        Ok(())
    }
}
