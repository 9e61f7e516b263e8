use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{DocumentStore, Transaction, TransactionWork};
use serde_json::json;

use super::{
    HarvestCompleted, HarvestCreated, ShortfallPolicy, collect_requirements, object_fields,
    plan_deductions, require_entity,
};
use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{
    ActivityAction, Harvest, HarvestCompletion, HarvestStatus, HarvestedProduct, NewHarvest,
    Product,
};
use crate::service::FarmService;

/// Category given to harvested products that do not name one.
pub const DEFAULT_HARVEST_CATEGORY: &str = "harvest";

/// Builds the lot number of the `index`-th product of a harvest.
///
/// The format is `LOT-<first 8 chars of harvest id>-<yyyymmddHHMMSS>-<n>`
/// with `n` counting from 1.
pub fn lot_number(harvest_id: &DocumentId, now: DateTime<Utc>, index: usize) -> String {
    format!(
        "LOT-{}-{}-{}",
        harvest_id.prefix(8),
        now.format("%Y%m%d%H%M%S"),
        index + 1
    )
}

struct CreateHarvest<'a> {
    harvest: &'a Harvest,
    policy: ShortfallPolicy,
    now: DateTime<Utc>,
}

#[async_trait]
impl TransactionWork for CreateHarvest<'_> {
    type Output = HarvestCreated;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<HarvestCreated> {
        let requirements = collect_requirements(self.harvest.selected_products.iter().map(|line| {
            (
                line.product_id.clone(),
                line.product_name.clone(),
                line.quantity,
            )
        }));
        let plan = plan_deductions(tx, &requirements, self.policy, "create_harvest").await?;

        plan.write(tx, self.now)?;
        tx.create_as(self.harvest.key(), self.harvest)?;

        Ok(HarvestCreated {
            harvest: self.harvest.clone(),
            deductions: plan.deductions,
            shortfalls: plan.shortfalls,
        })
    }
}

struct CompleteHarvest<'a> {
    id: &'a DocumentId,
    completion: &'a HarvestCompletion,
    reject_closed: bool,
    now: DateTime<Utc>,
}

impl CompleteHarvest<'_> {
    fn new_product(&self, harvest: &Harvest, output: &HarvestedProduct, index: usize) -> Product {
        Product {
            id: DocumentId::generate(),
            name: output.name.clone(),
            category: output
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_HARVEST_CATEGORY.to_string()),
            unit: output.unit.clone(),
            stock: output.quantity,
            min_stock: output.min_stock.unwrap_or(0.0),
            cost: output.cost.unwrap_or(0.0),
            warehouse_id: output.warehouse_id.clone(),
            field_id: harvest.field_id.clone(),
            expiration_date: output.expiration_date,
            lot_number: Some(lot_number(&harvest.id, self.now, index)),
            harvest_id: Some(harvest.id.clone()),
            notes: output.notes.clone(),
            created_at: Some(self.now),
            updated_at: Some(self.now),
        }
    }
}

#[async_trait]
impl TransactionWork for CompleteHarvest<'_> {
    type Output = HarvestCompleted;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<HarvestCompleted> {
        let mut harvest = require_entity::<Harvest>(tx, self.id).await?;
        if self.reject_closed && harvest.status == HarvestStatus::Cancelled {
            return Err(DomainError::InvalidStatusTransition {
                entity: Harvest::KIND.label(),
                from: harvest.status.to_string(),
                to: HarvestStatus::Completed.to_string(),
            });
        }

        let total_harvested = self.completion.total_harvested();
        harvest.status = HarvestStatus::Completed;
        harvest.total_harvested = Some(total_harvested);
        harvest.actual_yield = Some(self.completion.actual_yield.unwrap_or(total_harvested));
        harvest.harvested_products = self.completion.harvested_products.clone();
        harvest.harvest_date = Some(
            self.completion
                .harvest_date
                .unwrap_or_else(|| self.now.date_naive()),
        );
        if let Some(weather) = &self.completion.weather {
            harvest.weather = Some(weather.clone());
        }
        if let Some(notes) = &self.completion.notes {
            harvest.notes = Some(notes.clone());
        }
        harvest.completed_at = Some(self.now);
        harvest.updated_at = Some(self.now);

        let products: Vec<Product> = self
            .completion
            .harvested_products
            .iter()
            .enumerate()
            .map(|(index, output)| self.new_product(&harvest, output, index))
            .collect();

        tx.merge(harvest.key(), object_fields(&harvest)?);
        for product in &products {
            tx.create_as(product.key(), product)?;
        }

        Ok(HarvestCompleted { harvest, products })
    }
}

impl<S: DocumentStore + Clone> FarmService<S> {
    /// Creates a harvest and consumes its selected products.
    ///
    /// With the default [`ShortfallPolicy::Abort`] a missing product fails
    /// with `NotFound` and a short one with `InsufficientStock`; in both
    /// cases no stock changes and no harvest is stored.
    #[tracing::instrument(skip(self, input), fields(crop = %input.crop))]
    pub async fn create_harvest(&self, input: NewHarvest) -> Result<HarvestCreated> {
        input.validate()?;
        let now = self.clock().now();
        let harvest = input.into_harvest(DocumentId::generate(), now);
        let work = CreateHarvest {
            harvest: &harvest,
            policy: self.policy().harvest_creation,
            now,
        };
        let created = self.execute("create_harvest", &work).await?;

        tracing::info!(
            harvest_id = %created.harvest.id,
            deductions = created.deductions.len(),
            "harvest created"
        );
        self.log(
            Harvest::KIND,
            ActivityAction::Created,
            &created.harvest.id,
            &created.harvest.display_name(),
            json!({ "deductions": &created.deductions }),
        )
        .await;

        Ok(created)
    }

    /// Completes a harvest, turning each harvested output into a new product.
    ///
    /// Outputs are never merged into existing products. Completing the same
    /// harvest again stores another set of products. A cancelled harvest is
    /// completed too unless `reject_closed_completion` is set.
    #[tracing::instrument(skip(self, completion))]
    pub async fn complete_harvest(
        &self,
        id: &DocumentId,
        completion: HarvestCompletion,
    ) -> Result<HarvestCompleted> {
        completion.validate()?;
        let work = CompleteHarvest {
            id,
            completion: &completion,
            reject_closed: self.policy().reject_closed_completion,
            now: self.clock().now(),
        };
        let completed = self.execute("complete_harvest", &work).await?;

        tracing::info!(products = completed.products.len(), "harvest completed");
        let product_ids: Vec<&DocumentId> = completed.products.iter().map(|p| &p.id).collect();
        self.log(
            Harvest::KIND,
            ActivityAction::Completed,
            id,
            &completed.harvest.display_name(),
            json!({
                "totalHarvested": completed.harvest.total_harvested,
                "productIds": product_ids,
            }),
        )
        .await;

        Ok(completed)
    }
}
