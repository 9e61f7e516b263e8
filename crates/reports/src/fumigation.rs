//! Agrochemical usage by completed fumigations.

use std::collections::HashMap;

use common::DocumentId;
use domain::{Fumigation, FumigationStatus};
use serde::Serialize;

use crate::period::DateRange;
use crate::table::{ReportTable, amount};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUsage {
    pub product_id: DocumentId,
    pub product_name: String,
    pub total_quantity: f64,
    pub fumigation_count: usize,
    pub total_surface: f64,
}

/// Sums the products applied by completed fumigations in `range`, keyed on
/// application date (falling back to the completion date).
pub fn fumigation_product_usage(fumigations: &[Fumigation], range: &DateRange) -> Vec<ProductUsage> {
    let mut usage: HashMap<&DocumentId, ProductUsage> = HashMap::new();

    for fumigation in fumigations.iter().filter(|f| {
        f.status == FumigationStatus::Completed
            && range.contains(
                f.application_date
                    .or_else(|| f.completed_at.map(|at| at.date_naive())),
            )
    }) {
        for line in &fumigation.selected_products {
            let entry = usage.entry(&line.product_id).or_insert_with(|| ProductUsage {
                product_id: line.product_id.clone(),
                product_name: line.product_name.clone(),
                total_quantity: 0.0,
                fumigation_count: 0,
                total_surface: 0.0,
            });
            entry.total_quantity += line.total_quantity;
            entry.fumigation_count += 1;
            entry.total_surface += fumigation.total_surface;
        }
    }

    let mut rows: Vec<_> = usage.into_values().collect();
    rows.sort_by(|a, b| {
        b.total_quantity
            .total_cmp(&a.total_quantity)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    rows
}

pub fn usage_table(rows: &[ProductUsage], range: &DateRange) -> ReportTable {
    let mut table = ReportTable::new(
        format!("Fumigation product usage ({})", range.describe()),
        ["Product", "Applications", "Quantity", "Surface treated"],
    );
    for row in rows {
        table.push_row(vec![
            row.product_name.clone(),
            row.fumigation_count.to_string(),
            amount(row.total_quantity),
            amount(row.total_surface),
        ]);
    }
    table
}
