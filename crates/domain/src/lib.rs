//! Domain layer for the farm stock ledger.
//!
//! This crate provides:
//! - Entity types for every farm record, with explicit patch types
//! - A generic [`Repository`] over the document store
//! - [`FarmService`], which owns the stock-affecting transactions
//!   (fumigation completion, harvest creation and completion, transfers,
//!   direct stock adjustments) and the best-effort activity log

pub mod activity;
pub mod clock;
pub mod entity;
pub mod error;
pub mod model;
pub mod repository;
pub mod service;
pub mod stock;

pub use activity::{ActivityLogger, NoopActivityLogger, StoreActivityLogger, describe};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::{Entity, EntityKind, Patch};
pub use error::DomainError;
pub use model::*;
pub use repository::Repository;
pub use service::FarmService;
pub use stock::{
    FumigationCompleted, HarvestCompleted, HarvestCreated, ShortfallPolicy, StatusTracked,
    StockAdjustment, StockDeduction, StockPolicy, StockShortfall, TransferCompleted,
};
