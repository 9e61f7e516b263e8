use chrono::{DateTime, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::EntityKind;

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Updated,
    Deleted,
    StatusChanged,
    Completed,
    StockAdjusted,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Updated => "updated",
            ActivityAction::Deleted => "deleted",
            ActivityAction::StatusChanged => "status_changed",
            ActivityAction::Completed => "completed",
            ActivityAction::StockAdjusted => "stock_adjusted",
        }
    }
}

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(default)]
    pub id: DocumentId,
    pub entity_type: EntityKind,
    pub entity_id: DocumentId,
    #[serde(default)]
    pub entity_name: String,
    pub action: ActivityAction,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub const COLLECTION: &'static str = "activities";
}
