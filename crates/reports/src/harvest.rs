//! Harvest yield report.

use std::collections::HashMap;

use common::DocumentId;
use domain::{Field, Harvest, HarvestStatus};
use serde::Serialize;

use crate::period::DateRange;
use crate::table::{ReportTable, amount};

/// Estimated against actual yield for one completed harvest.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestYield {
    pub harvest_id: DocumentId,
    pub crop: String,
    pub field_name: String,
    pub estimated_yield: f64,
    pub actual_yield: f64,
    pub total_harvested: f64,
    /// Difference from the estimate in percent; `None` without an estimate.
    pub variance: Option<f64>,
}

/// Compares estimated and actual yield of the completed harvests whose
/// harvest date falls in `range`.
pub fn harvest_yield(harvests: &[Harvest], fields: &[Field], range: &DateRange) -> Vec<HarvestYield> {
    let field_names: HashMap<&DocumentId, &str> =
        fields.iter().map(|f| (&f.id, f.name.as_str())).collect();

    let mut rows: Vec<HarvestYield> = harvests
        .iter()
        .filter(|h| h.status == HarvestStatus::Completed && range.contains(h.harvest_date))
        .map(|harvest| {
            let actual = harvest.actual_yield.unwrap_or(0.0);
            HarvestYield {
                harvest_id: harvest.id.clone(),
                crop: harvest.crop.clone(),
                field_name: harvest
                    .field_id
                    .as_ref()
                    .and_then(|id| field_names.get(id))
                    .map(|name| name.to_string())
                    .unwrap_or_default(),
                estimated_yield: harvest.estimated_yield,
                actual_yield: actual,
                total_harvested: harvest.total_harvested.unwrap_or(0.0),
                variance: (harvest.estimated_yield > 0.0).then(|| {
                    (actual - harvest.estimated_yield) / harvest.estimated_yield * 100.0
                }),
            }
        })
        .collect();
    rows.sort_by(|a, b| a.crop.cmp(&b.crop).then_with(|| a.field_name.cmp(&b.field_name)));
    rows
}

pub fn harvest_table(rows: &[HarvestYield], range: &DateRange) -> ReportTable {
    let mut table = ReportTable::new(
        format!("Harvest yield ({})", range.describe()),
        ["Crop", "Field", "Estimated", "Actual", "Variance", "Harvested"],
    );
    for row in rows {
        table.push_row(vec![
            row.crop.clone(),
            row.field_name.clone(),
            amount(row.estimated_yield),
            amount(row.actual_yield),
            row.variance
                .map(|v| format!("{v:+.1}%"))
                .unwrap_or_else(|| "-".to_string()),
            amount(row.total_harvested),
        ]);
    }
    let harvested: f64 = rows.iter().map(|r| r.total_harvested).sum();
    table.push_summary("Harvests", rows.len().to_string());
    table.push_summary("Total harvested", amount(harvested));
    table
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use domain::NewHarvest;

    use super::*;

    fn harvest(id: &str, crop: &str, estimated: f64, actual: Option<f64>) -> Harvest {
        let mut harvest = NewHarvest {
            field_id: Some(DocumentId::new("f1")),
            crop: crop.to_string(),
            estimated_yield: estimated,
            ..Default::default()
        }
        .into_harvest(DocumentId::new(id), Utc::now());
        if let Some(actual) = actual {
            harvest.status = HarvestStatus::Completed;
            harvest.actual_yield = Some(actual);
            harvest.total_harvested = Some(actual * 10.0);
            harvest.harvest_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        }
        harvest
    }

    #[test]
    fn only_completed_harvests_are_reported() {
        let fields: Vec<Field> =
            vec![serde_json::from_value(serde_json::json!({"id": "f1", "name": "North"})).unwrap()];
        let harvests = vec![
            harvest("h1", "Wheat", 80.0, Some(100.0)),
            harvest("h2", "Corn", 0.0, Some(50.0)),
            harvest("h3", "Soy", 60.0, None),
        ];

        let rows = harvest_yield(&harvests, &fields, &DateRange::all());

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].crop, "Corn");
        assert_eq!(rows[0].variance, None);
        assert_eq!(rows[1].field_name, "North");
        assert_eq!(rows[1].variance, Some(25.0));

        let table = harvest_table(&rows, &DateRange::all());
        assert_eq!(table.rows[1][4], "+25.0%");
        assert_eq!(table.summary[1].1, "1500.00");
    }
}
