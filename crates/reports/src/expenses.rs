//! Expense reports.

use std::collections::BTreeMap;

use domain::Expense;
use serde::Serialize;

use crate::period::DateRange;
use crate::table::{ReportTable, amount};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category: String,
    pub count: usize,
    pub total: f64,
    /// Share of the period's total, 0 to 100.
    pub percentage: f64,
}

/// Sums expenses per category over a period, largest total first.
pub fn expenses_by_category(expenses: &[Expense], range: &DateRange) -> Vec<CategoryTotal> {
    let mut totals: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for expense in expenses.iter().filter(|e| range.contains(e.date)) {
        let entry = totals.entry(expense.category.as_str()).or_default();
        entry.0 += 1;
        entry.1 += expense.amount;
    }

    let grand_total: f64 = totals.values().map(|(_, total)| total).sum();
    let mut categories: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (count, total))| CategoryTotal {
            category: category.to_string(),
            count,
            total,
            percentage: if grand_total > 0.0 {
                total / grand_total * 100.0
            } else {
                0.0
            },
        })
        .collect();
    categories.sort_by(|a, b| b.total.total_cmp(&a.total));
    categories
}

pub fn expenses_table(categories: &[CategoryTotal], range: &DateRange) -> ReportTable {
    let mut table = ReportTable::new(
        format!("Expenses by category ({})", range.describe()),
        ["Category", "Entries", "Total", "Share"],
    );
    for category in categories {
        table.push_row(vec![
            category.category.clone(),
            category.count.to_string(),
            amount(category.total),
            format!("{:.1}%", category.percentage),
        ]);
    }
    let total: f64 = categories.iter().map(|c| c.total).sum();
    table.push_summary("Total", amount(total));
    table
}
