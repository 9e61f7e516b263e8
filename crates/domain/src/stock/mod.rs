//! Stock-affecting transactions.
//!
//! Every operation here reads the records it depends on, checks stock, and
//! buffers its writes inside one [`Transaction`], so either all of its
//! changes land or none do. Conflicting commits are retried by
//! [`document_store::run_transaction`].

mod adjust;
mod fumigation;
mod harvest;
mod status;
mod transfer;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{RetryPolicy, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{Fumigation, Harvest, Product, Transfer};
use crate::repository::decode_entity;

pub use harvest::{DEFAULT_HARVEST_CATEGORY, lot_number};
pub use status::StatusTracked;

/// What to do when a product cannot cover a deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortfallPolicy {
    /// Leave the product untouched, record the shortfall, and carry on.
    Skip,
    /// Abort the whole transaction.
    Abort,
}

impl ShortfallPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortfallPolicy::Skip => "skip",
            ShortfallPolicy::Abort => "abort",
        }
    }
}

impl FromStr for ShortfallPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(ShortfallPolicy::Skip),
            "abort" => Ok(ShortfallPolicy::Abort),
            other => Err(format!("unknown shortfall policy '{other}', expected skip or abort")),
        }
    }
}

impl std::fmt::Display for ShortfallPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shortfall handling per operation, plus the conflict retry policy.
///
/// The defaults keep the long-standing behavior: fumigation completion
/// skips products that are short, harvest creation aborts, and a
/// fumigation or harvest can be completed from any status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockPolicy {
    pub fumigation_completion: ShortfallPolicy,
    pub harvest_creation: ShortfallPolicy,
    /// Refuse to complete a fumigation that is already completed or
    /// cancelled, or a harvest that is cancelled.
    pub reject_closed_completion: bool,
    pub retry: RetryPolicy,
}

impl Default for StockPolicy {
    fn default() -> Self {
        Self {
            fumigation_completion: ShortfallPolicy::Skip,
            harvest_creation: ShortfallPolicy::Abort,
            reject_closed_completion: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// A deduction applied to one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockDeduction {
    pub product_id: DocumentId,
    pub product_name: String,
    pub quantity: f64,
    pub previous_stock: f64,
    pub new_stock: f64,
}

/// A deduction that was skipped because the product could not cover it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockShortfall {
    pub product_id: DocumentId,
    pub product_name: String,
    pub requested: f64,
    /// Zero when the product does not exist.
    pub available: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FumigationCompleted {
    pub fumigation: Fumigation,
    pub deductions: Vec<StockDeduction>,
    pub shortfalls: Vec<StockShortfall>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestCreated {
    pub harvest: Harvest,
    pub deductions: Vec<StockDeduction>,
    pub shortfalls: Vec<StockShortfall>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestCompleted {
    pub harvest: Harvest,
    /// Products created from the harvested outputs.
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCompleted {
    pub transfer: Transfer,
    /// The product at the source warehouse after the transfer.
    pub source: Product,
    /// The product holding the transferred stock. Same id as `source` when
    /// the whole stock moved.
    pub destination: Product,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjustment {
    pub product: Product,
    pub previous_stock: f64,
    pub new_stock: f64,
    pub delta: f64,
}

/// Quantity of one product a transaction wants to consume.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Requirement {
    pub product_id: DocumentId,
    pub product_name: String,
    pub quantity: f64,
}

/// Sums line items per product, keeping first-seen order and dropping
/// non-positive quantities.
pub(crate) fn collect_requirements<I>(lines: I) -> Vec<Requirement>
where
    I: IntoIterator<Item = (DocumentId, String, f64)>,
{
    let mut requirements: Vec<Requirement> = Vec::new();
    for (product_id, product_name, quantity) in lines {
        if quantity <= 0.0 {
            continue;
        }
        match requirements.iter_mut().find(|r| r.product_id == product_id) {
            Some(existing) => existing.quantity += quantity,
            None => requirements.push(Requirement {
                product_id,
                product_name,
                quantity,
            }),
        }
    }
    requirements
}

/// Deductions a transaction will write, and the ones it skipped.
#[derive(Debug, Default)]
pub(crate) struct DeductionPlan {
    pub deductions: Vec<StockDeduction>,
    pub shortfalls: Vec<StockShortfall>,
}

/// Reads every required product and decides what to deduct.
///
/// Must run before the transaction buffers any write.
pub(crate) async fn plan_deductions(
    tx: &mut Transaction<'_>,
    requirements: &[Requirement],
    policy: ShortfallPolicy,
    operation: &'static str,
) -> Result<DeductionPlan> {
    let mut plan = DeductionPlan::default();

    for requirement in requirements {
        let product = read_entity::<Product>(tx, &requirement.product_id).await?;
        let available = product.as_ref().map(|p| p.stock).unwrap_or(0.0);

        let product = match product {
            Some(product) if product.stock >= requirement.quantity => product,
            Some(product) if policy == ShortfallPolicy::Abort => {
                return Err(DomainError::InsufficientStock {
                    product_id: product.id,
                    product_name: product.name,
                    requested: requirement.quantity,
                    available,
                });
            }
            None if policy == ShortfallPolicy::Abort => {
                return Err(DomainError::not_found(
                    Product::KIND.label(),
                    &requirement.product_id,
                ));
            }
            short => {
                let product_name = short
                    .map(|p| p.name)
                    .unwrap_or_else(|| requirement.product_name.clone());
                tracing::warn!(
                    operation,
                    product_id = %requirement.product_id,
                    product_name = %product_name,
                    requested = requirement.quantity,
                    available,
                    "insufficient stock, skipping deduction"
                );
                metrics::counter!("stock_shortfalls_total", "operation" => operation).increment(1);
                plan.shortfalls.push(StockShortfall {
                    product_id: requirement.product_id.clone(),
                    product_name,
                    requested: requirement.quantity,
                    available,
                });
                continue;
            }
        };

        plan.deductions.push(StockDeduction {
            product_id: product.id,
            product_name: product.name,
            quantity: requirement.quantity,
            previous_stock: product.stock,
            new_stock: product.stock - requirement.quantity,
        });
    }

    Ok(plan)
}

impl DeductionPlan {
    /// Buffers the stock writes of the plan.
    pub(crate) fn write(&self, tx: &mut Transaction<'_>, now: DateTime<Utc>) -> Result<()> {
        for deduction in &self.deductions {
            tx.merge(
                Product::key_for(&deduction.product_id),
                stock_fields(deduction.new_stock, now)?,
            );
        }
        Ok(())
    }
}

/// Reads and decodes an entity inside a transaction.
pub(crate) async fn read_entity<T: Entity>(
    tx: &mut Transaction<'_>,
    id: &DocumentId,
) -> Result<Option<T>> {
    match tx.get(&T::key_for(id)).await? {
        Some(document) => decode_entity(document).map(Some),
        None => Ok(None),
    }
}

/// Reads an entity that must exist inside a transaction.
pub(crate) async fn require_entity<T: Entity>(
    tx: &mut Transaction<'_>,
    id: &DocumentId,
) -> Result<T> {
    read_entity(tx, id)
        .await?
        .ok_or_else(|| DomainError::not_found(T::KIND.label(), id))
}

pub(crate) fn stock_fields(stock: f64, now: DateTime<Utc>) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    fields.insert("stock".to_string(), serde_json::to_value(stock)?);
    fields.insert("updatedAt".to_string(), serde_json::to_value(now)?);
    Ok(fields)
}

/// Serializes a value and returns its top-level fields.
pub(crate) fn object_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(DomainError::validation("expected an object")),
    }
}
