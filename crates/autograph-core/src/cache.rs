//! Locally cached document copies and the on-disk data directory

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CanvasDocument;

/// Data directory: .autograph/
pub const DATA_DIR: &str = ".autograph";

/// Offline store file inside the data directory
pub const STORE_FILE: &str = "offline.json";

/// Get data directory path
pub fn data_dir(root: &Path) -> PathBuf {
    root.join(DATA_DIR)
}

/// Get offline store file path
pub fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STORE_FILE)
}

/// Ensure data directory exists
pub fn ensure_data_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Remove the data directory and everything in it
pub fn clear_data_dir(dir: &Path) -> std::io::Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
        tracing::debug!("Removed data directory: {}", dir.display());
    }
    Ok(())
}

/// A read copy of a diagram fetched from the document store.
///
/// Replaced wholesale by a newer fetch; never merged or edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDocument {
    pub diagram_id: String,
    pub version: Option<u64>,
    pub document: CanvasDocument,
    pub cached_at: DateTime<Utc>,
}

impl CachedDocument {
    pub fn new(diagram_id: impl Into<String>, version: Option<u64>, document: CanvasDocument) -> Self {
        CachedDocument {
            diagram_id: diagram_id.into(),
            version,
            document,
            cached_at: Utc::now(),
        }
    }

    /// Whether this copy holds the given version.
    pub fn holds(&self, version: u64) -> bool {
        self.version == Some(version)
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }
}
