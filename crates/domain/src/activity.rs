//! Best-effort audit trail.
//!
//! Activity entries are written after the operation they describe has
//! committed. Logging never fails the operation: errors are reported with
//! `tracing::warn!` and dropped.

use async_trait::async_trait;
use common::DocumentId;
use document_store::{DocumentKey, DocumentStore, DocumentStoreExt};
use serde_json::Value;

use crate::clock::Clock;
use crate::entity::EntityKind;
use crate::error::Result;
use crate::model::{ActivityAction, ActivityEntry};

/// Sink for activity entries.
#[async_trait]
pub trait ActivityLogger: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<()>;
}

/// Writes entries to the `activities` collection.
pub struct StoreActivityLogger<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> StoreActivityLogger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: DocumentStore> ActivityLogger for StoreActivityLogger<S> {
    async fn record(&self, entry: ActivityEntry) -> Result<()> {
        let key = DocumentKey::new(ActivityEntry::COLLECTION, entry.id.clone());
        self.store.create(key, serde_json::to_value(&entry)?).await?;
        Ok(())
    }
}

/// Discards every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopActivityLogger;

#[async_trait]
impl ActivityLogger for NoopActivityLogger {
    async fn record(&self, _entry: ActivityEntry) -> Result<()> {
        Ok(())
    }
}

/// Returns the human-readable description of an action on a record.
pub fn describe(kind: EntityKind, action: ActivityAction, name: &str) -> String {
    use ActivityAction::*;
    use EntityKind::*;

    match (kind, action) {
        (Product, Created) => format!("Product \"{name}\" added to inventory"),
        (Product, Updated) => format!("Product \"{name}\" updated"),
        (Product, Deleted) => format!("Product \"{name}\" removed from inventory"),
        (Product, StockAdjusted) => format!("Stock of \"{name}\" adjusted"),
        (Field, Created) => format!("Field \"{name}\" registered"),
        (Warehouse, Created) => format!("Warehouse \"{name}\" registered"),
        (Fumigation, Created) => format!("Fumigation {name} scheduled"),
        (Fumigation, Completed) => format!("Fumigation {name} completed"),
        (Fumigation, StatusChanged) => format!("Fumigation {name} status changed"),
        (Harvest, Created) => format!("Harvest of {name} planned"),
        (Harvest, Completed) => format!("Harvest of {name} completed"),
        (Harvest, StatusChanged) => format!("Harvest of {name} status changed"),
        (Transfer, Created) => format!("Transfer of \"{name}\" requested"),
        (Transfer, Completed) => format!("Transfer of \"{name}\" completed"),
        (Transfer, StatusChanged) => format!("Transfer of \"{name}\" status changed"),
        (Purchase, Created) => format!("Purchase from {name} recorded"),
        (Expense, Created) => format!("Expense \"{name}\" recorded"),
        (User, Created) => format!("User {name} added"),
        (kind, Updated) => format!("{kind} \"{name}\" updated"),
        (kind, Deleted) => format!("{kind} \"{name}\" deleted"),
        (kind, StatusChanged) => format!("{kind} \"{name}\" status changed"),
        (kind, Completed) => format!("{kind} \"{name}\" completed"),
        (kind, StockAdjusted) => format!("{kind} \"{name}\" stock adjusted"),
    }
}

/// Builds an entry stamped with the clock's current time.
pub fn entry(
    clock: &dyn Clock,
    kind: EntityKind,
    action: ActivityAction,
    entity_id: &DocumentId,
    entity_name: &str,
    metadata: Value,
) -> ActivityEntry {
    ActivityEntry {
        id: DocumentId::generate(),
        entity_type: kind,
        entity_id: entity_id.clone(),
        entity_name: entity_name.to_string(),
        action,
        description: describe(kind, action, entity_name),
        user_id: None,
        metadata,
        timestamp: clock.now(),
    }
}

/// Records an entry, logging and swallowing any failure.
pub async fn log_best_effort(logger: &dyn ActivityLogger, entry: ActivityEntry) {
    let entity_id = entry.entity_id.clone();
    let action = entry.action;
    if let Err(error) = logger.record(entry).await {
        tracing::warn!(
            entity_id = %entity_id,
            action = action.as_str(),
            error = %error,
            "failed to record activity"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use document_store::InMemoryDocumentStore;

    use super::*;
    use crate::clock::FixedClock;
    use crate::error::DomainError;

    struct FailingLogger;

    #[async_trait]
    impl ActivityLogger for FailingLogger {
        async fn record(&self, _entry: ActivityEntry) -> Result<()> {
            Err(DomainError::validation("activity sink unavailable"))
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2024, 3, 10, 8, 30, 0).unwrap())
    }

    #[test]
    fn describes_known_pairs() {
        assert_eq!(
            describe(EntityKind::Harvest, ActivityAction::Completed, "Soy"),
            "Harvest of Soy completed"
        );
        assert_eq!(
            describe(EntityKind::Field, ActivityAction::Deleted, "North"),
            "Field \"North\" deleted"
        );
    }

    #[test]
    fn every_kind_has_its_own_creation_description() {
        let kinds = [
            EntityKind::Product,
            EntityKind::Field,
            EntityKind::Warehouse,
            EntityKind::Fumigation,
            EntityKind::Harvest,
            EntityKind::Transfer,
            EntityKind::Purchase,
            EntityKind::Expense,
            EntityKind::User,
        ];
        for kind in kinds {
            let description = describe(kind, ActivityAction::Created, "X");
            assert!(!description.ends_with("created"), "{kind}: {description}");
        }
    }

    #[tokio::test]
    async fn store_logger_writes_activity_document() {
        let store = InMemoryDocumentStore::new();
        let logger = StoreActivityLogger::new(store.clone());
        let entry = entry(
            &clock(),
            EntityKind::Product,
            ActivityAction::Created,
            &DocumentId::new("p1"),
            "Urea",
            Value::Null,
        );

        logger.record(entry.clone()).await.unwrap();

        assert_eq!(store.document_count(ActivityEntry::COLLECTION).await, 1);
        let stored = store
            .get(&DocumentKey::new(ActivityEntry::COLLECTION, entry.id.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.data["description"], "Product \"Urea\" added to inventory");
        assert_eq!(stored.data["entityType"], "product");
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        let entry = entry(
            &clock(),
            EntityKind::Product,
            ActivityAction::Deleted,
            &DocumentId::new("p1"),
            "Urea",
            Value::Null,
        );
        log_best_effort(&FailingLogger, entry).await;
    }
}
