//! JSON file store under the data directory
//!
//! The whole store is one file. Each mutation writes a complete copy to a
//! temporary file in the same directory and renames it over the old one, so
//! a crash leaves either the previous or the new state on disk.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use autograph_core::CachedDocument;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::{sort_by_seq, LocalStore};
use crate::edit::PendingEdit;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    edits: BTreeMap<String, PendingEdit>,
    #[serde(default)]
    documents: BTreeMap<String, CachedDocument>,
}

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<StoreData>,
}

impl FileStore {
    /// Open the store at `path`, loading existing contents if the file exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            if json.trim().is_empty() {
                StoreData::default()
            } else {
                serde_json::from_str(&json)?
            }
        } else {
            StoreData::default()
        };

        tracing::debug!(
            "Opened offline store {} ({} pending edits, {} cached documents)",
            path.display(),
            data.edits.len(),
            data.documents.len()
        );

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `change` to a copy, persist it, then publish it in memory.
    fn mutate(&self, change: impl FnOnce(&mut StoreData)) -> StoreResult<()> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }

    fn persist(&self, data: &StoreData) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, data)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn put_edit(&self, edit: &PendingEdit) -> StoreResult<()> {
        self.mutate(|data| {
            data.edits.insert(edit.id.clone(), edit.clone());
        })
    }

    fn get_edit(&self, id: &str) -> StoreResult<Option<PendingEdit>> {
        Ok(self.lock().edits.get(id).cloned())
    }

    fn all_edits(&self) -> StoreResult<Vec<PendingEdit>> {
        let mut edits: Vec<_> = self.lock().edits.values().cloned().collect();
        sort_by_seq(&mut edits);
        Ok(edits)
    }

    fn delete_edit(&self, id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.edits.remove(id);
        })
    }

    fn clear_edits(&self) -> StoreResult<()> {
        self.mutate(|data| data.edits.clear())
    }

    fn put_document(&self, document: &CachedDocument) -> StoreResult<()> {
        self.mutate(|data| {
            data.documents
                .insert(document.diagram_id.clone(), document.clone());
        })
    }

    fn get_document(&self, diagram_id: &str) -> StoreResult<Option<CachedDocument>> {
        Ok(self.lock().documents.get(diagram_id).cloned())
    }

    fn delete_document(&self, diagram_id: &str) -> StoreResult<()> {
        self.mutate(|data| {
            data.documents.remove(diagram_id);
        })
    }

    fn clear_documents(&self) -> StoreResult<()> {
        self.mutate(|data| data.documents.clear())
    }
}
