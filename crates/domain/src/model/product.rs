use chrono::{DateTime, NaiveDate, Utc};
use common::DocumentId;
use document_store::DocumentQuery;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Patch, ensure_present, ensure_quantity};
use crate::error::Result;

/// An inventory item: seed, fertilizer, agrochemical, or harvested output.
///
/// `stock` is the quantity on hand in `unit`. Managed transactions never
/// take it below zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub stock: f64,
    #[serde(default)]
    pub min_stock: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    /// Set on products produced by a harvest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harvest_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Returns true if stock has dropped below the configured minimum.
    pub fn is_below_min_stock(&self) -> bool {
        self.stock < self.min_stock
    }

    /// Returns true if the product expires on or before `date`.
    pub fn expires_by(&self, date: NaiveDate) -> bool {
        self.expiration_date.is_some_and(|d| d <= date)
    }

    /// Stock valued at unit cost.
    pub fn stock_value(&self) -> f64 {
        self.stock * self.cost
    }
}

impl Entity for Product {
    const COLLECTION: &'static str = "products";
    const KIND: EntityKind = EntityKind::Product;

    fn id(&self) -> &DocumentId {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}

/// Input for creating a product by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub stock: f64,
    #[serde(default)]
    pub min_stock: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub warehouse_id: Option<DocumentId>,
    #[serde(default)]
    pub field_id: Option<DocumentId>,
    #[serde(default)]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default)]
    pub lot_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        ensure_present("name", &self.name)?;
        ensure_quantity("stock", self.stock)?;
        ensure_quantity("minStock", self.min_stock)?;
        ensure_quantity("cost", self.cost)
    }

    /// Builds the stored product.
    pub fn into_product(self, id: DocumentId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            unit: self.unit,
            stock: self.stock,
            min_stock: self.min_stock,
            cost: self.cost,
            warehouse_id: self.warehouse_id,
            field_id: self.field_id,
            expiration_date: self.expiration_date,
            lot_number: self.lot_number,
            harvest_id: None,
            notes: self.notes,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }
}

/// Partial update of a product. Only the fields that are set change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<DocumentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lot_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Patch<Product> for ProductPatch {
    fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            ensure_present("name", name)?;
        }
        if let Some(stock) = self.stock {
            ensure_quantity("stock", stock)?;
        }
        if let Some(min_stock) = self.min_stock {
            ensure_quantity("minStock", min_stock)?;
        }
        if let Some(cost) = self.cost {
            ensure_quantity("cost", cost)?;
        }
        Ok(())
    }
}

/// Criteria for listing products.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(default)]
    pub warehouse_id: Option<DocumentId>,
    #[serde(default)]
    pub field_id: Option<DocumentId>,
    #[serde(default)]
    pub category: Option<String>,
    /// Only products whose stock is below their minimum.
    #[serde(default)]
    pub below_min_stock: bool,
}

impl ProductFilter {
    /// Builds the store query for the equality criteria.
    pub fn to_query(&self) -> DocumentQuery {
        let mut query = Product::query();
        if let Some(warehouse_id) = &self.warehouse_id {
            query = query.where_eq("warehouseId", warehouse_id.as_str());
        }
        if let Some(field_id) = &self.field_id {
            query = query.where_eq("fieldId", field_id.as_str());
        }
        if let Some(category) = &self.category {
            query = query.where_eq("category", category.as_str());
        }
        query
    }

    /// Applies the criteria that compare two fields of the same product.
    pub fn retain(&self, product: &Product) -> bool {
        !self.below_min_stock || product.is_below_min_stock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_document_with_defaults() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "p1",
            "name": "Glyphosate",
            "stock": 20,
            "minStock": 5,
            "warehouseId": "w1"
        }))
        .unwrap();

        assert_eq!(product.stock, 20.0);
        assert_eq!(product.min_stock, 5.0);
        assert_eq!(product.warehouse_id, Some(DocumentId::new("w1")));
        assert_eq!(product.cost, 0.0);
        assert!(!product.is_below_min_stock());
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = ProductPatch {
            stock: Some(12.0),
            min_stock: Some(3.0),
            ..Default::default()
        };
        let fields = patch.to_fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields["minStock"], 3.0);
    }

    #[test]
    fn patch_rejects_negative_stock() {
        let patch = ProductPatch {
            stock: Some(-1.0),
            ..Default::default()
        };
        assert!(Patch::<Product>::validate(&patch).is_err());
    }

    #[test]
    fn filter_builds_equality_query() {
        let filter = ProductFilter {
            warehouse_id: Some(DocumentId::new("w1")),
            category: Some("fertilizer".to_string()),
            ..Default::default()
        };
        let query = filter.to_query();
        assert_eq!(query.collection, "products");
        assert_eq!(query.filters.len(), 2);
    }
}
