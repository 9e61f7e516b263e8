use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{DocumentStore, Transaction, TransactionWork};
use serde::Serialize;
use serde_json::{Map, json};

use super::require_entity;
use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{
    ActivityAction, Fumigation, FumigationStatus, Harvest, HarvestStatus, Transfer,
    TransferStatus,
};
use crate::service::FarmService;

/// A record with a status field guarded by a transition table.
pub trait StatusTracked: Entity {
    type Status: Copy + PartialEq + Serialize + std::fmt::Display + Send + Sync;

    fn status(&self) -> Self::Status;

    fn set_status(&mut self, status: Self::Status);

    /// Returns true if a plain status update may move `from` to `to`.
    fn can_transition(from: Self::Status, to: Self::Status) -> bool;
}

impl StatusTracked for Fumigation {
    type Status = FumigationStatus;

    fn status(&self) -> FumigationStatus {
        self.status
    }

    fn set_status(&mut self, status: FumigationStatus) {
        self.status = status;
    }

    fn can_transition(from: FumigationStatus, to: FumigationStatus) -> bool {
        from.can_transition_to(to)
    }
}

impl StatusTracked for Harvest {
    type Status = HarvestStatus;

    fn status(&self) -> HarvestStatus {
        self.status
    }

    fn set_status(&mut self, status: HarvestStatus) {
        self.status = status;
    }

    fn can_transition(from: HarvestStatus, to: HarvestStatus) -> bool {
        from.can_transition_to(to)
    }
}

impl StatusTracked for Transfer {
    type Status = TransferStatus;

    fn status(&self) -> TransferStatus {
        self.status
    }

    fn set_status(&mut self, status: TransferStatus) {
        self.status = status;
    }

    fn can_transition(from: TransferStatus, to: TransferStatus) -> bool {
        from.can_transition_to(to)
    }
}

struct ChangeStatus<'a, T: StatusTracked> {
    id: &'a DocumentId,
    status: T::Status,
    now: DateTime<Utc>,
    _phantom: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: StatusTracked> TransactionWork for ChangeStatus<'_, T> {
    type Output = (T, T::Status);
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<(T, T::Status)> {
        let mut record = require_entity::<T>(tx, self.id).await?;
        let previous = record.status();
        if previous == self.status {
            return Ok((record, previous));
        }
        if !T::can_transition(previous, self.status) {
            return Err(DomainError::InvalidStatusTransition {
                entity: T::KIND.label(),
                from: previous.to_string(),
                to: self.status.to_string(),
            });
        }

        let mut fields = Map::new();
        fields.insert("status".to_string(), serde_json::to_value(self.status)?);
        fields.insert("updatedAt".to_string(), json!(self.now));
        tx.merge(record.key(), fields);
        record.set_status(self.status);

        Ok((record, previous))
    }
}

impl<S: DocumentStore + Clone> FarmService<S> {
    /// Moves a record to a new status if its transition table allows it.
    ///
    /// Setting the current status again is a no-op. `completed` is never
    /// reachable here; use the matching completion operation.
    #[tracing::instrument(skip(self, status), fields(kind = T::KIND.label(), status = %status))]
    pub async fn update_status<T: StatusTracked>(
        &self,
        id: &DocumentId,
        status: T::Status,
    ) -> Result<T> {
        let work = ChangeStatus::<T> {
            id,
            status,
            now: self.clock().now(),
            _phantom: PhantomData,
        };
        let (record, previous) = self.execute("update_status", &work).await?;

        if previous != status {
            self.log(
                T::KIND,
                ActivityAction::StatusChanged,
                id,
                &record.display_name(),
                json!({ "from": previous.to_string(), "to": status.to_string() }),
            )
            .await;
        }

        Ok(record)
    }
}
