//! Error types for document parsing and local data files

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The caller passed something that is not a canvas document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("element key `{key}` does not match element id `{id}`")]
    IdMismatch { key: String, id: String },

    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
