//! Product listing, creation and stock adjustment.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use document_store::DocumentStore;
use domain::{NewProduct, Product, ProductFilter, StockAdjustment};
use serde::Deserialize;

use super::document_id;
use crate::AppState;
use crate::error::ApiError;

/// GET /products?warehouseId=&fieldId=&category=&belowMinStock=
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.farm.list_products(&filter).await?))
}

/// POST /products
#[tracing::instrument(skip(state, input))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(input): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.farm.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /products/low-stock: products below their minimum, most depleted first.
#[tracing::instrument(skip(state))]
pub async fn low_stock<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.farm.low_stock_products().await?))
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub delta: f64,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /products/{id}/adjust
#[tracing::instrument(skip(state))]
pub async fn adjust<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<StockAdjustment>, ApiError> {
    let adjustment = state
        .farm
        .adjust_stock(&document_id(id), req.delta, req.reason)
        .await?;
    Ok(Json(adjustment))
}
