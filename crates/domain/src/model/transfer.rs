use chrono::{DateTime, NaiveDate, Utc};
use common::DocumentId;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, ensure_present, ensure_quantity};
use crate::error::{DomainError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    /// Only a pending transfer can be cancelled; completion has its own
    /// operation.
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!((self, next), (TransferStatus::Pending, TransferStatus::Cancelled))
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A movement of product stock between two warehouses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    #[serde(default)]
    pub id: DocumentId,
    #[serde(default)]
    pub status: TransferStatus,
    pub product_id: DocumentId,
    #[serde(default)]
    pub product_name: String,
    pub quantity: f64,
    pub source_warehouse_id: DocumentId,
    pub destination_warehouse_id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_date: Option<NaiveDate>,
    /// Product that received the stock, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_product_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Transfer {
    const COLLECTION: &'static str = "transfers";
    const KIND: EntityKind = EntityKind::Transfer;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        if self.product_name.is_empty() {
            self.product_id.to_string()
        } else {
            self.product_name.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    pub product_id: DocumentId,
    pub quantity: f64,
    pub source_warehouse_id: DocumentId,
    pub destination_warehouse_id: DocumentId,
    #[serde(default)]
    pub transfer_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewTransfer {
    pub fn validate(&self) -> Result<()> {
        ensure_present("productId", self.product_id.as_str())?;
        ensure_present("sourceWarehouseId", self.source_warehouse_id.as_str())?;
        ensure_present(
            "destinationWarehouseId",
            self.destination_warehouse_id.as_str(),
        )?;
        ensure_quantity("quantity", self.quantity)?;
        if self.quantity == 0.0 {
            return Err(DomainError::validation("quantity must be greater than zero"));
        }
        if self.source_warehouse_id == self.destination_warehouse_id {
            return Err(DomainError::validation(
                "source and destination warehouses must differ",
            ));
        }
        Ok(())
    }

    pub fn into_transfer(
        self,
        id: DocumentId,
        product_name: String,
        now: DateTime<Utc>,
    ) -> Transfer {
        Transfer {
            id,
            status: TransferStatus::Pending,
            product_id: self.product_id,
            product_name,
            quantity: self.quantity,
            source_warehouse_id: self.source_warehouse_id,
            destination_warehouse_id: self.destination_warehouse_id,
            transfer_date: self.transfer_date,
            destination_product_id: None,
            notes: self.notes,
            completed_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewTransfer {
        NewTransfer {
            product_id: DocumentId::new("p1"),
            quantity: 10.0,
            source_warehouse_id: DocumentId::new("w1"),
            destination_warehouse_id: DocumentId::new("w2"),
            transfer_date: None,
            notes: None,
        }
    }

    #[test]
    fn rejects_same_warehouse() {
        let mut transfer = input();
        transfer.destination_warehouse_id = DocumentId::new("w1");
        assert!(transfer.validate().is_err());
    }

    #[test]
    fn rejects_zero_quantity() {
        let mut transfer = input();
        transfer.quantity = 0.0;
        assert!(transfer.validate().is_err());
        assert!(input().validate().is_ok());
    }
}
