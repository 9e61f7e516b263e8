//! Inventory reports.

use std::collections::HashMap;

use common::DocumentId;
use domain::{Product, Warehouse};
use serde::Serialize;

use crate::table::{ReportTable, amount};

/// Label used for products that are not assigned to a warehouse.
pub const UNASSIGNED: &str = "Unassigned";

/// Stock held in one warehouse, valued at unit cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseValuation {
    pub warehouse_id: Option<DocumentId>,
    pub warehouse_name: String,
    pub product_count: usize,
    pub total_value: f64,
    pub below_min_stock: usize,
}

/// Groups products by warehouse and values their stock.
///
/// Warehouses are listed by name; products without a warehouse, or whose
/// warehouse no longer exists, come last under [`UNASSIGNED`].
pub fn inventory_by_warehouse(
    products: &[Product],
    warehouses: &[Warehouse],
) -> Vec<WarehouseValuation> {
    let names: HashMap<&DocumentId, &str> = warehouses
        .iter()
        .map(|w| (&w.id, w.name.as_str()))
        .collect();

    let mut groups: HashMap<Option<&DocumentId>, WarehouseValuation> = HashMap::new();
    for product in products {
        let warehouse_id = product
            .warehouse_id
            .as_ref()
            .filter(|id| names.contains_key(id));
        let valuation = groups
            .entry(warehouse_id)
            .or_insert_with(|| WarehouseValuation {
                warehouse_id: warehouse_id.cloned(),
                warehouse_name: warehouse_id
                    .and_then(|id| names.get(id))
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| UNASSIGNED.to_string()),
                product_count: 0,
                total_value: 0.0,
                below_min_stock: 0,
            });
        valuation.product_count += 1;
        valuation.total_value += product.stock_value();
        if product.is_below_min_stock() {
            valuation.below_min_stock += 1;
        }
    }

    let mut valuations: Vec<_> = groups.into_values().collect();
    valuations.sort_by(|a, b| {
        a.warehouse_id
            .is_none()
            .cmp(&b.warehouse_id.is_none())
            .then_with(|| a.warehouse_name.cmp(&b.warehouse_name))
    });
    valuations
}

pub fn inventory_table(valuations: &[WarehouseValuation]) -> ReportTable {
    let mut table = ReportTable::new(
        "Inventory valuation by warehouse",
        ["Warehouse", "Products", "Below minimum", "Stock value"],
    );
    for valuation in valuations {
        table.push_row(vec![
            valuation.warehouse_name.clone(),
            valuation.product_count.to_string(),
            valuation.below_min_stock.to_string(),
            amount(valuation.total_value),
        ]);
    }
    let total: f64 = valuations.iter().map(|v| v.total_value).sum();
    table.push_summary("Total stock value", amount(total));
    table
}

/// Products below their minimum stock, most depleted first.
pub fn low_stock(products: &[Product]) -> Vec<&Product> {
    let mut low: Vec<&Product> = products.iter().filter(|p| p.is_below_min_stock()).collect();
    low.sort_by(|a, b| {
        (a.stock - a.min_stock)
            .total_cmp(&(b.stock - b.min_stock))
            .then_with(|| a.name.cmp(&b.name))
    });
    low
}

pub fn low_stock_table(products: &[&Product]) -> ReportTable {
    let mut table = ReportTable::new(
        "Products below minimum stock",
        ["Product", "Category", "Stock", "Minimum", "Missing", "Unit"],
    );
    for product in products {
        table.push_row(vec![
            product.name.clone(),
            product.category.clone(),
            amount(product.stock),
            amount(product.min_stock),
            amount(product.min_stock - product.stock),
            product.unit.clone(),
        ]);
    }
    table.push_summary("Products", products.len().to_string());
    table
}
