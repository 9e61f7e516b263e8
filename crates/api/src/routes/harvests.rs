//! Harvest creation and completion.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{HarvestCompleted, HarvestCompletion, HarvestCreated, NewHarvest};

use super::document_id;
use crate::AppState;
use crate::error::ApiError;

/// POST /harvests: stores the harvest and consumes its selected products.
#[tracing::instrument(skip(state, input))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(input): Json<NewHarvest>,
) -> Result<(StatusCode, Json<HarvestCreated>), ApiError> {
    let created = state.farm.create_harvest(input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// POST /harvests/{id}/complete: records the outputs as new products.
#[tracing::instrument(skip(state, completion))]
pub async fn complete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(completion): Json<HarvestCompletion>,
) -> Result<Json<HarvestCompleted>, ApiError> {
    let completed = state
        .farm
        .complete_harvest(&document_id(id), completion)
        .await?;
    Ok(Json(completed))
}
