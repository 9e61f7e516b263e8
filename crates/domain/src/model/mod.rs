//! Farm records.

mod activity;
mod fumigation;
mod harvest;
mod product;
mod records;
mod transfer;

pub use activity::{ActivityAction, ActivityEntry};
pub use fumigation::{
    Fumigation, FumigationCompletion, FumigationPatch, FumigationProduct, FumigationStatus,
    NewFumigation,
};
pub use harvest::{
    Harvest, HarvestCompletion, HarvestInput, HarvestPatch, HarvestStatus, HarvestedProduct,
    NewHarvest,
};
pub use product::{NewProduct, Product, ProductFilter, ProductPatch};
pub use records::{
    Expense, ExpensePatch, Field, FieldPatch, Purchase, PurchasePatch, User, UserPatch, UserRole,
    Warehouse, WarehousePatch,
};
pub use transfer::{NewTransfer, Transfer, TransferStatus};

use serde::{Deserialize, Serialize};

/// Weather observed while working a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weather {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
}
