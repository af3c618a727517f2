//! Offline edit queue and document store access for AutoGraph
//!
//! Edits made while the document store is unreachable are persisted in a
//! local store and replayed, per diagram in enqueue order, once it is
//! reachable again. Diagram versions fetched for the diff view are cached
//! in the same local store.

pub mod cache;
pub mod driver;
pub mod edit;
pub mod error;
pub mod policy;
pub mod queue;
pub mod remote;
pub mod store;


pub use cache::DocumentCache;
pub use driver::run_sync_loop;
pub use edit::{EditKind, EditState, HoldReason, PendingEdit};
pub use error::{FailureClass, RemoteError, StoreError, SyncError, SyncResult};
pub use policy::{SyncHealth, SyncPolicy, SyncStatus};
pub use queue::{FlushReport, OfflineSyncQueue};
pub use remote::{create_document_store, DocumentStore, RemoteConfig};
pub use store::{FileStore, LocalStore, MemoryStore};
