//! Shared types for the farm stock ledger.

pub mod types;

pub use types::DocumentId;
