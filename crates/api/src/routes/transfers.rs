//! Warehouse transfers.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{NewTransfer, Transfer, TransferCompleted};

use super::document_id;
use crate::AppState;
use crate::error::ApiError;

/// POST /transfers
#[tracing::instrument(skip(state, input))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(input): Json<NewTransfer>,
) -> Result<(StatusCode, Json<Transfer>), ApiError> {
    let transfer = state.farm.create_transfer(input).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// POST /transfers/{id}/complete
#[tracing::instrument(skip(state))]
pub async fn complete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<TransferCompleted>, ApiError> {
    let completed = state.farm.complete_transfer(&document_id(id)).await?;
    Ok(Json(completed))
}
