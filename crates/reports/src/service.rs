//! Loads records and builds reports on demand.

use std::str::FromStr;
use std::sync::Arc;

use document_store::DocumentStore;
use domain::{Expense, FarmService, Field, Fumigation, Harvest, Product, Warehouse};
use futures_util::try_join;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::period::DateRange;
use crate::table::ReportTable;
use crate::{expenses, fumigation, harvest, inventory};

/// The reports that can be requested by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportKind {
    Inventory,
    LowStock,
    Expenses,
    HarvestYield,
    FumigationUsage,
}

impl ReportKind {
    pub const ALL: [ReportKind; 5] = [
        ReportKind::Inventory,
        ReportKind::LowStock,
        ReportKind::Expenses,
        ReportKind::HarvestYield,
        ReportKind::FumigationUsage,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Inventory => "inventory",
            ReportKind::LowStock => "low-stock",
            ReportKind::Expenses => "expenses",
            ReportKind::HarvestYield => "harvest-yield",
            ReportKind::FumigationUsage => "fumigation-usage",
        }
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s)
            .ok_or_else(|| ReportError::UnknownReport(s.to_string()))
    }
}

/// Builds reports from the records held by a [`FarmService`].
pub struct ReportService<S: DocumentStore + Clone> {
    farm: Arc<FarmService<S>>,
}

impl<S: DocumentStore + Clone> ReportService<S> {
    pub fn new(farm: Arc<FarmService<S>>) -> Self {
        Self { farm }
    }

    /// Loads the records a report needs and renders it to a table.
    ///
    /// Inventory reports describe the current stock and ignore `range`.
    #[tracing::instrument(skip(self), fields(report = kind.slug()))]
    pub async fn build(&self, kind: ReportKind, range: DateRange) -> Result<ReportTable> {
        let table = match kind {
            ReportKind::Inventory => {
                let (products, warehouses) = try_join!(
                    self.farm.list::<Product>(),
                    self.farm.list::<Warehouse>()
                )?;
                inventory::inventory_table(&inventory::inventory_by_warehouse(
                    &products,
                    &warehouses,
                ))
            }
            ReportKind::LowStock => {
                let products = self.farm.list::<Product>().await?;
                inventory::low_stock_table(&inventory::low_stock(&products))
            }
            ReportKind::Expenses => {
                let expenses = self.farm.list::<Expense>().await?;
                expenses::expenses_table(&expenses::expenses_by_category(&expenses, &range), &range)
            }
            ReportKind::HarvestYield => {
                let (harvests, fields) =
                    try_join!(self.farm.list::<Harvest>(), self.farm.list::<Field>())?;
                harvest::harvest_table(&harvest::harvest_yield(&harvests, &fields, &range), &range)
            }
            ReportKind::FumigationUsage => {
                let fumigations = self.farm.list::<Fumigation>().await?;
                fumigation::usage_table(
                    &fumigation::fumigation_product_usage(&fumigations, &range),
                    &range,
                )
            }
        };

        metrics::counter!("reports_generated_total", "report" => kind.slug()).increment(1);
        tracing::debug!(rows = table.rows.len(), "report built");
        Ok(table)
    }
}
