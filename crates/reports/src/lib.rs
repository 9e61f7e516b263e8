//! Farm reports.
//!
//! Every report is a pure function over records the caller has already
//! loaded, returning typed rows plus a [`ReportTable`] that a renderer (PDF,
//! CSV, HTML) can lay out without knowing the domain. [`ReportService`]
//! loads the records from a [`domain::FarmService`] and dispatches by
//! [`ReportKind`].

pub mod error;
pub mod expenses;
pub mod fumigation;
pub mod harvest;
pub mod inventory;
pub mod period;
pub mod service;
pub mod table;

pub use error::{ReportError, Result};
pub use expenses::{CategoryTotal, expenses_by_category};
pub use fumigation::{ProductUsage, fumigation_product_usage};
pub use harvest::{HarvestYield, harvest_yield};
pub use inventory::{WarehouseValuation, inventory_by_warehouse, low_stock};
pub use period::DateRange;
pub use service::{ReportKind, ReportService};
pub use table::ReportTable;
