//! Error types for the offline store, the remote document store and the queue

use autograph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// How the queue reacts to a failed replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network trouble, timeouts, 5xx: retry later.
    Transient,
    /// The server refused the edit: hold it for the user.
    Permanent,
    /// Version mismatch: hold it and surface merge/overwrite/discard.
    Conflict,
}

/// Failure reported by the remote document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("document store unreachable: {0}")]
    Transient(String),

    #[error("document store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("unexpected response from document store: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Map an HTTP error status to a remote error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            409 | 412 => RemoteError::Conflict(message),
            // Auth failures clear up once the session is refreshed
            401 | 403 | 408 | 429 => RemoteError::Transient(format!("HTTP {}: {}", status, message)),
            500..=599 => RemoteError::Transient(format!("HTTP {}: {}", status, message)),
            _ => RemoteError::Rejected { status, message },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            RemoteError::Transient(_) => FailureClass::Transient,
            RemoteError::Conflict(_) => FailureClass::Conflict,
            RemoteError::Rejected { .. } | RemoteError::InvalidResponse(_) => FailureClass::Permanent,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Document(#[from] CoreError),

    #[error("no pending edit with id {0}")]
    UnknownEdit(String),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
