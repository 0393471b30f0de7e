// zds-core/src/error.rs
// Error taxonomy for the ZDS core

use thiserror::Error;

/// All errors surfaced by the ZDS core.
#[derive(Debug, Error)]
pub enum ZdsError {
    /// Document ID rejected by validation
    #[error("invalid document id: {0}")]
    InvalidId(String),

    /// Lookup or delete of an absent document ID
    #[error("document not found: {0}")]
    NotFound(String),

    /// Strict-mode write whose fingerprint differs from the collection's
    #[error("schema mismatch in strict mode: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    /// JSON encode/decode failure outside the data path
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying filesystem failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored bytes failed to decode, or index and log disagree
    #[error("corruption: {0}")]
    Corruption(String),

    /// Another writer holds the advisory lock for this root
    #[error("store is locked: {0}")]
    Locked(String),

    /// Mutation attempted through a read-only handle
    #[error("read-only store: {0}")]
    ReadOnly(String),

    /// Dataset indexing past its length
    #[error("index {index} out of bounds for dataset of size {len}")]
    IndexOutOfBounds { index: isize, len: usize },
}

impl From<serde_json::Error> for ZdsError {
    fn from(err: serde_json::Error) -> Self {
        ZdsError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZdsError>;
