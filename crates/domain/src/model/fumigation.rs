use chrono::{DateTime, NaiveDate, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};

use super::Weather;
use crate::entity::{Entity, EntityKind, Patch, ensure_present, ensure_quantity};
use crate::error::Result;

/// Lifecycle of a fumigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FumigationStatus {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl FumigationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FumigationStatus::Pending => "pending",
            FumigationStatus::InProgress => "in-progress",
            FumigationStatus::Completed => "completed",
            FumigationStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, FumigationStatus::Completed | FumigationStatus::Cancelled)
    }

    /// Returns true if a plain status update may move from `self` to `next`.
    ///
    /// `Completed` is only reachable through fumigation completion, which
    /// also deducts stock.
    pub fn can_transition_to(&self, next: FumigationStatus) -> bool {
        use FumigationStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Cancelled) | (InProgress, Pending) | (InProgress, Cancelled)
        )
    }
}

impl std::fmt::Display for FumigationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agrochemical applied during a fumigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FumigationProduct {
    pub product_id: DocumentId,
    #[serde(default)]
    pub product_name: String,
    /// Quantity to deduct from stock on completion.
    #[serde(default)]
    pub total_quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose_per_hectare: Option<f64>,
}

/// A planned or executed application of products over a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fumigation {
    #[serde(default)]
    pub id: DocumentId,
    #[serde(default)]
    pub status: FumigationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_surface: f64,
    #[serde(default)]
    pub selected_products: Vec<FumigationProduct>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
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

impl Entity for Fumigation {
    const COLLECTION: &'static str = "fumigations";
    const KIND: EntityKind = EntityKind::Fumigation;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        match (&self.order_number, &self.crop) {
            (Some(order), _) => format!("order {order}"),
            (None, Some(crop)) => crop.clone(),
            (None, None) => self.id.prefix(8).to_string(),
        }
    }
}

/// Input for scheduling a fumigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFumigation {
    #[serde(default)]
    pub field_id: Option<DocumentId>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub applicator: Option<String>,
    #[serde(default)]
    pub application_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_surface: f64,
    #[serde(default)]
    pub selected_products: Vec<FumigationProduct>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewFumigation {
    pub fn validate(&self) -> Result<()> {
        ensure_quantity("totalSurface", self.total_surface)?;
        for line in &self.selected_products {
            ensure_present("productId", line.product_id.as_str())?;
            ensure_quantity("totalQuantity", line.total_quantity)?;
        }
        Ok(())
    }

    pub fn into_fumigation(self, id: DocumentId, now: DateTime<Utc>) -> Fumigation {
        Fumigation {
            id,
            status: FumigationStatus::Pending,
            field_id: self.field_id,
            order_number: self.order_number,
            crop: self.crop,
            applicator: self.applicator,
            application_date: self.application_date,
            total_surface: self.total_surface,
            selected_products: self.selected_products,
            start_time: None,
            end_time: None,
            weather: None,
            notes: self.notes,
            completed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Metadata recorded when a fumigation is completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FumigationCompletion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl FumigationCompletion {
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time)
            && end < start
        {
            return Err(crate::DomainError::validation(
                "endTime must not be earlier than startTime",
            ));
        }
        Ok(())
    }
}

/// Editable fumigation fields. Status and products change through dedicated
/// operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FumigationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_surface: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Fumigation> for FumigationPatch {
    fn validate(&self) -> Result<()> {
        if let Some(surface) = self.total_surface {
            ensure_quantity("totalSurface", surface)?;
        }
        Ok(())
    }
}
