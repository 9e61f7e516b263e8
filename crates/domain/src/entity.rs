//! Core entity and patch traits.

use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{DocumentKey, DocumentQuery};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::error::{DomainError, Result};

/// The kinds of records kept by the farm ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Field,
    Warehouse,
    Fumigation,
    Harvest,
    Transfer,
    Purchase,
    Expense,
    User,
}

impl EntityKind {
    /// Human-readable singular name.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Product => "Product",
            EntityKind::Field => "Field",
            EntityKind::Warehouse => "Warehouse",
            EntityKind::Fumigation => "Fumigation",
            EntityKind::Harvest => "Harvest",
            EntityKind::Transfer => "Transfer",
            EntityKind::Purchase => "Purchase",
            EntityKind::Expense => "Expense",
            EntityKind::User => "User",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A record stored as one document in its own collection.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection holding documents of this type.
    const COLLECTION: &'static str;

    /// Kind used for errors and the activity log.
    const KIND: EntityKind;

    /// Returns the record's id.
    fn id(&self) -> &DocumentId;

    /// Returns a name suitable for activity descriptions.
    fn display_name(&self) -> String;

    /// Checks a record before it is first stored.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Updates the record's own timestamps before it is written.
    fn touch(&mut self, _now: DateTime<Utc>) {}

    /// Returns the document key for an id.
    fn key_for(id: &DocumentId) -> DocumentKey {
        DocumentKey::new(Self::COLLECTION, id.clone())
    }

    /// Returns this record's document key.
    fn key(&self) -> DocumentKey {
        Self::key_for(self.id())
    }

    /// Starts a query over this entity's collection.
    fn query() -> DocumentQuery {
        DocumentQuery::collection(Self::COLLECTION)
    }
}

/// A partial update for an entity.
///
/// Patches serialize only the fields that are set; the result is merged into
/// the stored document.
pub trait Patch<T: Entity>: Serialize + Send + Sync {
    /// Checks the patch before it is applied.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the top-level fields to merge.
    fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Err(DomainError::validation("patch must serialize to an object")),
        }
    }
}

/// Checks that a quantity is a finite, non-negative number.
pub(crate) fn ensure_quantity(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Checks that a required text field is not blank.
pub(crate) fn ensure_present(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}
