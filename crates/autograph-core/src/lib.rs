//! AutoGraph Core: canvas document model and version diff engine

pub mod model;
pub mod classify;
pub mod diff;
pub mod cache;
pub mod error;


#[cfg(test)]
pub mod test_utils;

pub use model::{ElementId, Element, Position, Size, StyleMap, CanvasDocument};
pub use classify::{StyleClassifier, StyleKeyClass, DEFAULT_COLOR_KEYS};
pub use diff::{ChangeKind, DiffResult, DiffSummary, ElementModification, VersionDiffEngine, compare};
pub use cache::{DATA_DIR, STORE_FILE, CachedDocument, data_dir, store_path, ensure_data_dir, clear_data_dir};
pub use error::{CoreError, Result};
