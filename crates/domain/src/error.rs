//! Domain error types.

use common::DocumentId;
use document_store::DocumentStoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: DocumentId,
    },

    /// A product does not hold enough stock for a deduction.
    #[error(
        "Insufficient stock for product {product_name} ({product_id}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: DocumentId,
        product_name: String,
        requested: f64,
        available: f64,
    },

    /// The record is not in a state that allows the requested change.
    #[error("Invalid status transition for {entity}: cannot go from {from} to {to}")]
    InvalidStatusTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: &DocumentId) -> Self {
        DomainError::NotFound {
            entity,
            id: id.clone(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DomainError::Validation(message.into())
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
