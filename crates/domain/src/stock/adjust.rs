use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{DocumentStore, Transaction, TransactionWork};
use serde_json::json;

use super::{StockAdjustment, require_entity, stock_fields};
use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{ActivityAction, Product, ProductFilter};
use crate::service::FarmService;

struct AdjustStock<'a> {
    id: &'a DocumentId,
    delta: f64,
    now: DateTime<Utc>,
}

#[async_trait]
impl TransactionWork for AdjustStock<'_> {
    type Output = StockAdjustment;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<StockAdjustment> {
        let mut product = require_entity::<Product>(tx, self.id).await?;
        let previous_stock = product.stock;
        let new_stock = previous_stock + self.delta;
        if new_stock < 0.0 {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                requested: -self.delta,
                available: previous_stock,
            });
        }

        tx.merge(product.key(), stock_fields(new_stock, self.now)?);
        product.stock = new_stock;
        product.updated_at = Some(self.now);

        Ok(StockAdjustment {
            product,
            previous_stock,
            new_stock,
            delta: self.delta,
        })
    }
}

impl<S: DocumentStore + Clone> FarmService<S> {
    /// Adds `delta` to a product's stock; negative values deduct.
    ///
    /// Fails with `InsufficientStock` if the result would be negative.
    #[tracing::instrument(skip(self, reason))]
    pub async fn adjust_stock(
        &self,
        id: &DocumentId,
        delta: f64,
        reason: Option<String>,
    ) -> Result<StockAdjustment> {
        if !delta.is_finite() {
            return Err(DomainError::validation("delta must be a finite number"));
        }
        let work = AdjustStock {
            id,
            delta,
            now: self.clock().now(),
        };
        let adjustment = self.execute("adjust_stock", &work).await?;

        self.log(
            Product::KIND,
            ActivityAction::StockAdjusted,
            id,
            &adjustment.product.display_name(),
            json!({
                "previousStock": adjustment.previous_stock,
                "newStock": adjustment.new_stock,
                "reason": reason,
            }),
        )
        .await;

        Ok(adjustment)
    }

    /// Products whose stock is below their minimum, most depleted first.
    pub async fn low_stock_products(&self) -> Result<Vec<Product>> {
        let mut products = self
            .list_products(&ProductFilter {
                below_min_stock: true,
                ..Default::default()
            })
            .await?;
        products.sort_by(|a, b| {
            (a.stock - a.min_stock)
                .total_cmp(&(b.stock - b.min_stock))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(products)
    }
}
