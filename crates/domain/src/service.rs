//! Service façade over the farm records.

use std::sync::Arc;
use std::time::Instant;

use common::DocumentId;
use document_store::{DocumentQuery, DocumentStore, TransactionWork, run_transaction};
use serde_json::Value;

use crate::activity::{self, ActivityLogger, StoreActivityLogger};
use crate::clock::{Clock, SystemClock};
use crate::entity::{Entity, EntityKind, Patch};
use crate::error::{DomainError, Result};
use crate::model::{
    ActivityAction, ActivityEntry, Fumigation, NewFumigation, NewProduct, NewTransfer, Product,
    ProductFilter, Transfer,
};
use crate::repository::Repository;
use crate::stock::StockPolicy;

/// Entry point for every farm operation.
///
/// Plain records go through the generic `create`/`update`/`delete` methods;
/// anything that moves stock lives in [`crate::stock`]. Every successful
/// write is followed by a best-effort activity entry.
pub struct FarmService<S: DocumentStore + Clone> {
    store: S,
    policy: StockPolicy,
    clock: Arc<dyn Clock>,
    activity: Arc<dyn ActivityLogger>,
}

impl<S: DocumentStore + Clone + 'static> FarmService<S> {
    /// Creates a service that logs activity to the same store.
    pub fn new(store: S) -> Self {
        let activity = Arc::new(StoreActivityLogger::new(store.clone()));
        Self {
            store,
            policy: StockPolicy::default(),
            clock: Arc::new(SystemClock),
            activity,
        }
    }
}

impl<S: DocumentStore + Clone> FarmService<S> {
    pub fn with_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_activity_logger(mut self, activity: Arc<dyn ActivityLogger>) -> Self {
        self.activity = activity;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &StockPolicy {
        &self.policy
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Returns a repository for one entity type.
    pub fn repository<T: Entity>(&self) -> Repository<S, T> {
        Repository::new(self.store.clone())
    }

    // Generic record access

    pub async fn get<T: Entity>(&self, id: &DocumentId) -> Result<Option<T>> {
        self.repository::<T>().get(id).await
    }

    pub async fn require<T: Entity>(&self, id: &DocumentId) -> Result<T> {
        self.repository::<T>().require(id).await
    }

    pub async fn list<T: Entity>(&self) -> Result<Vec<T>> {
        self.repository::<T>().list().await
    }

    pub async fn find<T: Entity>(&self, query: DocumentQuery) -> Result<Vec<T>> {
        self.repository::<T>().find(query).await
    }

    /// Stores a new record and returns it as written.
    #[tracing::instrument(skip_all, fields(kind = T::KIND.label()))]
    pub async fn create<T: Entity>(&self, mut record: T) -> Result<T> {
        record.validate()?;
        record.touch(self.clock.now());
        let stored = self.repository::<T>().insert(&record).await?;
        self.log(T::KIND, ActivityAction::Created, stored.id(), &stored.display_name(), Value::Null)
            .await;
        Ok(stored)
    }

    /// Applies a patch to a record and returns it as written.
    #[tracing::instrument(skip(self, patch), fields(kind = T::KIND.label()))]
    pub async fn update<T: Entity, P: Patch<T>>(&self, id: &DocumentId, patch: &P) -> Result<T> {
        let updated = self
            .repository::<T>()
            .update(id, patch, self.clock.now())
            .await?;
        let changes = Value::Object(patch.to_fields()?);
        self.log(T::KIND, ActivityAction::Updated, id, &updated.display_name(), changes)
            .await;
        Ok(updated)
    }

    /// Deletes a record.
    #[tracing::instrument(skip(self), fields(kind = T::KIND.label()))]
    pub async fn delete<T: Entity>(&self, id: &DocumentId) -> Result<()> {
        let repository = self.repository::<T>();
        let existing = repository.require(id).await?;
        repository.delete(id).await?;
        self.log(T::KIND, ActivityAction::Deleted, id, &existing.display_name(), Value::Null)
            .await;
        Ok(())
    }

    /// Returns the most recent activity entries, newest first.
    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        self.store
            .query(
                DocumentQuery::collection(ActivityEntry::COLLECTION)
                    .order_by("timestamp", document_store::SortDirection::Descending)
                    .limit(limit),
            )
            .await?
            .into_iter()
            .map(|document| serde_json::from_value(document.data).map_err(DomainError::from))
            .collect()
    }

    // Typed creation

    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        input.validate()?;
        let product = input.into_product(DocumentId::generate(), self.clock.now());
        self.create(product).await
    }

    /// Lists products matching a filter, ordered by name.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let query = filter
            .to_query()
            .order_by("name", document_store::SortDirection::Ascending);
        let mut products = self.find::<Product>(query).await?;
        products.retain(|p| filter.retain(p));
        Ok(products)
    }

    #[tracing::instrument(skip(self, input))]
    pub async fn create_fumigation(&self, input: NewFumigation) -> Result<Fumigation> {
        input.validate()?;
        let fumigation = input.into_fumigation(DocumentId::generate(), self.clock.now());
        self.create(fumigation).await
    }

    /// Records a pending transfer. Stock moves only when it is completed.
    #[tracing::instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn create_transfer(&self, input: NewTransfer) -> Result<Transfer> {
        input.validate()?;
        let product = self.require::<Product>(&input.product_id).await?;
        if let Some(warehouse_id) = &product.warehouse_id
            && *warehouse_id != input.source_warehouse_id
        {
            return Err(DomainError::validation(format!(
                "product {} is stored in warehouse {warehouse_id}, not {}",
                product.id, input.source_warehouse_id
            )));
        }
        if product.stock < input.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                requested: input.quantity,
                available: product.stock,
            });
        }
        let transfer = input.into_transfer(DocumentId::generate(), product.name, self.clock.now());
        self.create(transfer).await
    }

    // Plumbing shared by the stock operations

    /// Runs a transaction body with the configured retry policy, recording
    /// metrics for the operation.
    pub(crate) async fn execute<W>(&self, operation: &'static str, work: &W) -> Result<W::Output>
    where
        W: TransactionWork<Error = DomainError>,
    {
        let start = Instant::now();
        let result = run_transaction(&self.store, &self.policy.retry, work).await;

        let outcome = match &result {
            Ok(_) => "committed",
            Err(DomainError::Store(err)) if err.is_conflict() => {
                metrics::counter!("stock_transaction_conflicts_total", "operation" => operation)
                    .increment(1);
                "conflict"
            }
            Err(_) => "aborted",
        };
        metrics::counter!("stock_transactions_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("stock_transaction_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        result
    }

    /// Records an activity entry without failing the caller.
    pub(crate) async fn log(
        &self,
        kind: EntityKind,
        action: ActivityAction,
        id: &DocumentId,
        name: &str,
        metadata: Value,
    ) {
        let entry = activity::entry(self.clock.as_ref(), kind, action, id, name, metadata);
        activity::log_best_effort(self.activity.as_ref(), entry).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use document_store::{DocumentStoreExt, InMemoryDocumentStore};

    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{Field, FieldPatch, ProductPatch};

    fn create_test_service() -> FarmService<InMemoryDocumentStore> {
        FarmService::new(InMemoryDocumentStore::new()).with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        )))
    }

    fn north_field() -> Field {
        Field {
            id: DocumentId::new("f1"),
            name: "North".to_string(),
            area: 40.0,
            location: None,
            crop: Some("Soy".to_string()),
            soil_type: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn create_stamps_and_logs_activity() {
        let service = create_test_service();
        let field = service.create(north_field()).await.unwrap();

        assert!(field.created_at.is_some());
        let activity = service.recent_activity(10).await.unwrap();
        assert_eq!(activity.len(), 1);
        assert_eq!(activity[0].action, ActivityAction::Created);
        assert_eq!(activity[0].description, "Field \"North\" registered");
    }

    #[tokio::test]
    async fn update_returns_patched_record() {
        let service = create_test_service();
        service.create(north_field()).await.unwrap();

        let patch = FieldPatch {
            area: Some(42.5),
            ..Default::default()
        };
        let updated: Field = service.update(&DocumentId::new("f1"), &patch).await.unwrap();

        assert_eq!(updated.area, 42.5);
        assert_eq!(updated.crop.as_deref(), Some("Soy"));
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let service = create_test_service();
        let result = service.delete::<Field>(&DocumentId::new("nope")).await;
        assert!(matches!(result, Err(DomainError::NotFound { entity: "Field", .. })));
    }

    #[tokio::test]
    async fn list_products_filters_below_minimum() {
        let service = create_test_service();
        for (name, stock) in [("Urea", 5.0), ("Atrazine", 50.0)] {
            service
                .create_product(NewProduct {
                    name: name.to_string(),
                    stock,
                    min_stock: 10.0,
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let low = service
            .list_products(&ProductFilter {
                below_min_stock: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(low.len(), 1);
        assert_eq!(low[0].name, "Urea");
    }

    #[tokio::test]
    async fn transfer_larger_than_stock_is_rejected() {
        let service = create_test_service();
        let product = service
            .create_product(NewProduct {
                name: "Seed".to_string(),
                stock: 5.0,
                warehouse_id: Some(DocumentId::new("w1")),
                ..Default::default()
            })
            .await
            .unwrap();

        let result = service
            .create_transfer(NewTransfer {
                product_id: product.id,
                quantity: 8.0,
                source_warehouse_id: DocumentId::new("w1"),
                destination_warehouse_id: DocumentId::new("w2"),
                transfer_date: None,
                notes: None,
            })
            .await;

        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
    }

    #[tokio::test]
    async fn product_patch_keeps_other_fields() {
        let service = create_test_service();
        let product = service
            .create_product(NewProduct {
                name: "Urea".to_string(),
                unit: "kg".to_string(),
                stock: 12.0,
                ..Default::default()
            })
            .await
            .unwrap();

        let patch = ProductPatch {
            cost: Some(3.5),
            ..Default::default()
        };
        let updated: Product = service.update(&product.id, &patch).await.unwrap();

        assert_eq!(updated.unit, "kg");
        assert_eq!(updated.stock_value(), 42.0);
        assert!(service.store().exists(&product.key()).await.unwrap());
    }
}
