//! Transactional JSON document store.
//!
//! Documents live in named collections and carry a version that is bumped on
//! every write. Multi-document transactions are optimistic: reads record the
//! version they observed, and the commit fails with a conflict if any of those
//! documents changed in the meantime. [`run_transaction`] retries such
//! conflicts.

pub mod document;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod transaction;

pub use common::DocumentId;
pub use document::{Document, DocumentKey, Version};
pub use error::{DocumentStoreError, Result};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use query::{DocumentQuery, FieldFilter, FilterOp, SortDirection};
pub use store::{CommitReceipt, CommitRequest, DocumentStore, DocumentStoreExt, Precondition, WriteOp};
pub use transaction::{RetryPolicy, Transaction, TransactionWork, run_transaction};
