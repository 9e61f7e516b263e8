use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DocumentId;
use document_store::{Transaction, TransactionWork};
use serde_json::json;

use super::{
    FumigationCompleted, ShortfallPolicy, collect_requirements, object_fields, plan_deductions,
    require_entity,
};
use crate::entity::Entity;
use crate::error::{DomainError, Result};
use crate::model::{ActivityAction, Fumigation, FumigationCompletion, FumigationStatus};
use crate::service::FarmService;

struct CompleteFumigation<'a> {
    id: &'a DocumentId,
    completion: &'a FumigationCompletion,
    policy: ShortfallPolicy,
    reject_closed: bool,
    now: DateTime<Utc>,
}

#[async_trait]
impl TransactionWork for CompleteFumigation<'_> {
    type Output = FumigationCompleted;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_>) -> Result<FumigationCompleted> {
        let mut fumigation = require_entity::<Fumigation>(tx, self.id).await?;
        if self.reject_closed && fumigation.status.is_terminal() {
            return Err(DomainError::InvalidStatusTransition {
                entity: Fumigation::KIND.label(),
                from: fumigation.status.to_string(),
                to: FumigationStatus::Completed.to_string(),
            });
        }

        let requirements = collect_requirements(fumigation.selected_products.iter().map(|line| {
            (
                line.product_id.clone(),
                line.product_name.clone(),
                line.total_quantity,
            )
        }));
        let plan = plan_deductions(tx, &requirements, self.policy, "complete_fumigation").await?;
        plan.write(tx, self.now)?;

        let mut fields = object_fields(self.completion)?;
        fields.insert("status".to_string(), json!(FumigationStatus::Completed));
        fields.insert("completedAt".to_string(), json!(self.now));
        fields.insert("updatedAt".to_string(), json!(self.now));
        tx.merge(fumigation.key(), fields);

        fumigation.status = FumigationStatus::Completed;
        fumigation.completed_at = Some(self.now);
        fumigation.updated_at = Some(self.now);
        if let Some(start_time) = self.completion.start_time {
            fumigation.start_time = Some(start_time);
        }
        if let Some(end_time) = self.completion.end_time {
            fumigation.end_time = Some(end_time);
        }
        if let Some(weather) = &self.completion.weather {
            fumigation.weather = Some(weather.clone());
        }
        if let Some(notes) = &self.completion.notes {
            fumigation.notes = Some(notes.clone());
        }

        Ok(FumigationCompleted {
            fumigation,
            deductions: plan.deductions,
            shortfalls: plan.shortfalls,
        })
    }
}

impl<S: document_store::DocumentStore + Clone> FarmService<S> {
    /// Completes a fumigation and deducts the applied products from stock.
    ///
    /// Lines with a zero quantity are ignored. What happens to a product
    /// that cannot cover its line depends on
    /// [`StockPolicy::fumigation_completion`](super::StockPolicy): with
    /// `Skip` the product is left untouched and reported in
    /// `shortfalls`; with `Abort` nothing is written. Any status may be
    /// completed, so completing twice deducts twice, unless
    /// `reject_closed_completion` is set.
    #[tracing::instrument(skip(self, completion))]
    pub async fn complete_fumigation(
        &self,
        id: &DocumentId,
        completion: FumigationCompletion,
    ) -> Result<FumigationCompleted> {
        completion.validate()?;
        let work = CompleteFumigation {
            id,
            completion: &completion,
            policy: self.policy().fumigation_completion,
            reject_closed: self.policy().reject_closed_completion,
            now: self.clock().now(),
        };
        let completed = self.execute("complete_fumigation", &work).await?;

        tracing::info!(
            deductions = completed.deductions.len(),
            shortfalls = completed.shortfalls.len(),
            "fumigation completed"
        );
        self.log(
            Fumigation::KIND,
            ActivityAction::Completed,
            id,
            &completed.fumigation.display_name(),
            json!({
                "deductions": &completed.deductions,
                "shortfalls": &completed.shortfalls,
            }),
        )
        .await;

        Ok(completed)
    }
}
