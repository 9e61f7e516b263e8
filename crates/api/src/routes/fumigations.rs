//! Fumigation creation and completion.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{Fumigation, FumigationCompleted, FumigationCompletion, NewFumigation};

use super::document_id;
use crate::AppState;
use crate::error::ApiError;

/// POST /fumigations
#[tracing::instrument(skip(state, input))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(input): Json<NewFumigation>,
) -> Result<(StatusCode, Json<Fumigation>), ApiError> {
    let fumigation = state.farm.create_fumigation(input).await?;
    Ok((StatusCode::CREATED, Json(fumigation)))
}

/// POST /fumigations/{id}/complete
///
/// Responds with the completed fumigation plus the deductions applied and
/// any products that were skipped for lack of stock.
#[tracing::instrument(skip(state, completion))]
pub async fn complete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(completion): Json<FumigationCompletion>,
) -> Result<Json<FumigationCompleted>, ApiError> {
    let completed = state
        .farm
        .complete_fumigation(&document_id(id), completion)
        .await?;
    Ok(Json(completed))
}
