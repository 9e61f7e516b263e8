use chrono::{DateTime, NaiveDate, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};

use super::Weather;
use crate::entity::{Entity, EntityKind, Patch, ensure_present, ensure_quantity};
use crate::error::{DomainError, Result};

/// Lifecycle of a harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarvestStatus {
    #[default]
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStatus::Pending => "pending",
            HarvestStatus::Scheduled => "scheduled",
            HarvestStatus::InProgress => "in_progress",
            HarvestStatus::Completed => "completed",
            HarvestStatus::Cancelled => "cancelled",
        }
    }

    /// Returns true if a plain status update may move from `self` to `next`.
    ///
    /// `Completed` is only reachable through harvest completion, which
    /// records the harvested products.
    pub fn can_transition_to(&self, next: HarvestStatus) -> bool {
        use HarvestStatus::*;
        matches!(
            (self, next),
            (Pending, Scheduled)
                | (Pending, InProgress)
                | (Pending, Cancelled)
                | (Scheduled, Pending)
                | (Scheduled, InProgress)
                | (Scheduled, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A product consumed when a harvest is created (seed, fertilizer, fuel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestInput {
    pub product_id: DocumentId,
    #[serde(default)]
    pub product_name: String,
    pub quantity: f64,
}

/// An output of a harvest. Each one becomes a new product on completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestedProduct {
    pub name: String,
    pub quantity: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl HarvestedProduct {
    pub fn validate(&self) -> Result<()> {
        ensure_present("name", &self.name)?;
        ensure_quantity("quantity", self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Harvest {
    #[serde(default)]
    pub id: DocumentId,
    #[serde(default)]
    pub status: HarvestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default)]
    pub crop: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_area: f64,
    #[serde(default)]
    pub estimated_yield: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_harvested: Option<f64>,
    #[serde(default)]
    pub selected_products: Vec<HarvestInput>,
    #[serde(default)]
    pub harvested_products: Vec<HarvestedProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Harvest {
    const COLLECTION: &'static str = "harvests";
    const KIND: EntityKind = EntityKind::Harvest;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        if self.crop.is_empty() {
            self.id.prefix(8).to_string()
        } else {
            self.crop.clone()
        }
    }
}

/// Input for creating a harvest. Creating it consumes `selected_products`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHarvest {
    #[serde(default)]
    pub field_id: Option<DocumentId>,
    pub crop: String,
    #[serde(default)]
    pub status: Option<HarvestStatus>,
    #[serde(default)]
    pub planned_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_area: f64,
    #[serde(default)]
    pub estimated_yield: f64,
    #[serde(default)]
    pub selected_products: Vec<HarvestInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewHarvest {
    pub fn validate(&self) -> Result<()> {
        ensure_present("crop", &self.crop)?;
        ensure_quantity("totalArea", self.total_area)?;
        ensure_quantity("estimatedYield", self.estimated_yield)?;
        if matches!(self.status, Some(HarvestStatus::Completed)) {
            return Err(DomainError::validation(
                "a harvest cannot be created as completed",
            ));
        }
        for line in &self.selected_products {
            ensure_present("productId", line.product_id.as_str())?;
            ensure_quantity("quantity", line.quantity)?;
        }
        Ok(())
    }

    pub fn into_harvest(self, id: DocumentId, now: DateTime<Utc>) -> Harvest {
        Harvest {
            id,
            status: self.status.unwrap_or_default(),
            field_id: self.field_id,
            crop: self.crop,
            planned_date: self.planned_date,
            harvest_date: None,
            total_area: self.total_area,
            estimated_yield: self.estimated_yield,
            actual_yield: None,
            total_harvested: None,
            selected_products: self.selected_products,
            harvested_products: Vec::new(),
            weather: None,
            notes: self.notes,
            completed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Data recorded when a harvest is completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestCompletion {
    #[serde(default)]
    pub harvested_products: Vec<HarvestedProduct>,
    #[serde(default)]
    pub actual_yield: Option<f64>,
    /// Defaults to the sum of the harvested quantities.
    #[serde(default)]
    pub total_harvested: Option<f64>,
    #[serde(default)]
    pub harvest_date: Option<NaiveDate>,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl HarvestCompletion {
    pub fn validate(&self) -> Result<()> {
        for product in &self.harvested_products {
            product.validate()?;
        }
        if let Some(actual) = self.actual_yield {
            ensure_quantity("actualYield", actual)?;
        }
        if let Some(total) = self.total_harvested {
            ensure_quantity("totalHarvested", total)?;
        }
        Ok(())
    }

    pub fn total_harvested(&self) -> f64 {
        self.total_harvested
            .unwrap_or_else(|| self.harvested_products.iter().map(|p| p.quantity).sum())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planned_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Harvest> for HarvestPatch {
    fn validate(&self) -> Result<()> {
        if let Some(crop) = &self.crop {
            ensure_present("crop", crop)?;
        }
        if let Some(area) = self.total_area {
            ensure_quantity("totalArea", area)?;
        }
        if let Some(estimated) = self.estimated_yield {
            ensure_quantity("estimatedYield", estimated)?;
        }
        Ok(())
    }
}
