use thiserror::Error;

use crate::{DocumentKey, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum DocumentStoreError {
    /// A document read inside a transaction changed before the commit.
    #[error("Concurrency conflict on {key}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        key: DocumentKey,
        expected: Version,
        actual: Version,
    },

    /// The document does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocumentKey),

    /// A create targeted a document that already exists.
    #[error("Document already exists: {0}")]
    AlreadyExists(DocumentKey),

    /// A transaction tried to read after buffering a write.
    #[error("Transaction read of {0} after a write was buffered")]
    ReadAfterWrite(DocumentKey),

    /// The commit request was malformed.
    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocumentStoreError {
    /// Returns true if retrying the transaction could succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DocumentStoreError::ConcurrencyConflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, DocumentStoreError>;
