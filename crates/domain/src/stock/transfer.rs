use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{DocumentStore, Transaction, TransactionWork};
use serde_json::{Map, json};

use super::{TransferCompleted, require_entity, stock_fields};
use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{ActivityAction, Product, Transfer, TransferStatus};
use crate::service::FarmService;

struct CompleteTransfer<'a> {
    id: &'a DocumentId,
    now: DateTime<Utc>,
}

#[async_trait]
impl TransactionWork for CompleteTransfer<'_> {
    type Output = TransferCompleted;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<TransferCompleted> {
        let mut transfer = require_entity::<Transfer>(tx, self.id).await?;
        if transfer.status != TransferStatus::Pending {
            return Err(DomainError::InvalidStatusTransition {
                entity: Transfer::KIND.label(),
                from: transfer.status.to_string(),
                to: TransferStatus::Completed.to_string(),
            });
        }

        let mut source = require_entity::<Product>(tx, &transfer.product_id).await?;
        if let Some(warehouse_id) = &source.warehouse_id
            && *warehouse_id != transfer.source_warehouse_id
        {
            return Err(DomainError::validation(format!(
                "product {} is no longer in warehouse {}",
                source.id, transfer.source_warehouse_id
            )));
        }
        if source.stock < transfer.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: source.id,
                product_name: source.name,
                requested: transfer.quantity,
                available: source.stock,
            });
        }

        let destination = if source.stock == transfer.quantity {
            // Whole stock moves: relocate the product itself.
            source.warehouse_id = Some(transfer.destination_warehouse_id.clone());
            source.updated_at = Some(self.now);
            let mut fields = Map::new();
            fields.insert("warehouseId".to_string(), json!(source.warehouse_id));
            fields.insert("updatedAt".to_string(), json!(self.now));
            tx.merge(source.key(), fields);
            source.clone()
        } else {
            let remaining = source.stock - transfer.quantity;
            tx.merge(source.key(), stock_fields(remaining, self.now)?);
            source.stock = remaining;
            source.updated_at = Some(self.now);

            let split = Product {
                id: DocumentId::generate(),
                stock: transfer.quantity,
                warehouse_id: Some(transfer.destination_warehouse_id.clone()),
                created_at: Some(self.now),
                updated_at: Some(self.now),
                ..source.clone()
            };
            tx.create_as(split.key(), &split)?;
            split
        };

        transfer.status = TransferStatus::Completed;
        transfer.destination_product_id = Some(destination.id.clone());
        transfer.completed_at = Some(self.now);
        transfer.updated_at = Some(self.now);
        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(transfer.status));
        fields.insert(
            "destinationProductId".to_string(),
            json!(transfer.destination_product_id),
        );
        fields.insert("completedAt".to_string(), json!(self.now));
        fields.insert("updatedAt".to_string(), json!(self.now));
        tx.merge(transfer.key(), fields);

        Ok(TransferCompleted {
            transfer,
            source,
            destination,
        })
    }
}

impl<S: DocumentStore + Clone> FarmService<S> {
    /// Moves the transferred quantity to the destination warehouse.
    ///
    /// If the transfer covers the product's whole stock the product itself
    /// is relocated; otherwise the source is reduced and a copy holding the
    /// transferred quantity is created at the destination. A product that
    /// can no longer cover the transfer fails the operation.
    #[tracing::instrument(skip(self))]
    pub async fn complete_transfer(&self, id: &DocumentId) -> Result<TransferCompleted> {
        let work = CompleteTransfer {
            id,
            now: self.clock().now(),
        };
        let completed = self.execute("complete_transfer", &work).await?;

        self.log(
            Transfer::KIND,
            ActivityAction::Completed,
            id,
            &completed.transfer.display_name(),
            json!({
                "quantity": completed.transfer.quantity,
                "destinationProductId": &completed.destination.id,
            }),
        )
        .await;

        Ok(completed)
    }
}
