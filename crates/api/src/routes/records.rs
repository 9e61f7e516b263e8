//! Generic handlers shared by every record type.
//!
//! The plain collections (fields, warehouses, purchases, expenses, users)
//! are served entirely from here; the stock-bearing records reuse the read,
//! update and status handlers and add their own transactional endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing};
use document_store::DocumentStore;
use domain::{Entity, Patch, StatusTracked};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::document_id;
use crate::AppState;
use crate::error::ApiError;

/// `/{collection}` and `/{collection}/{id}` routes for a plain record type.
pub fn collection<S, T, P>() -> Router<Arc<AppState<S>>>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
    P: Patch<T> + DeserializeOwned + 'static,
{
    Router::new()
        .route(
            &format!("/{}", T::COLLECTION),
            routing::get(list::<S, T>).post(create::<S, T>),
        )
        .route(
            &format!("/{}/{{id}}", T::COLLECTION),
            routing::get(get::<S, T>)
                .patch(update::<S, T, P>)
                .delete(delete::<S, T>),
        )
}

/// GET /{collection}
#[tracing::instrument(skip(state), fields(kind = T::KIND.label()))]
pub async fn list<S, T>(State(state): State<Arc<AppState<S>>>) -> Result<Json<Vec<T>>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
{
    Ok(Json(state.farm.list::<T>().await?))
}

/// GET /{collection}/{id}
#[tracing::instrument(skip(state), fields(kind = T::KIND.label()))]
pub async fn get<S, T>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<T>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
{
    let record = state
        .farm
        .get::<T>(&document_id(id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {id} not found", T::KIND)))?;
    Ok(Json(record))
}

/// POST /{collection}
#[tracing::instrument(skip(state, record), fields(kind = T::KIND.label()))]
pub async fn create<S, T>(
    State(state): State<Arc<AppState<S>>>,
    Json(record): Json<T>,
) -> Result<(StatusCode, Json<T>), ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
{
    let created = state.farm.create(record).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /{collection}/{id}
#[tracing::instrument(skip(state, patch), fields(kind = T::KIND.label()))]
pub async fn update<S, T, P>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(patch): Json<P>,
) -> Result<Json<T>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
    P: Patch<T> + DeserializeOwned + 'static,
{
    let updated = state.farm.update::<T, P>(&document_id(id), &patch).await?;
    Ok(Json(updated))
}

/// DELETE /{collection}/{id}
#[tracing::instrument(skip(state), fields(kind = T::KIND.label()))]
pub async fn delete<S, T>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: Entity + 'static,
{
    state.farm.delete::<T>(&document_id(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate<St> {
    pub status: St,
}

/// POST /{collection}/{id}/status
#[tracing::instrument(skip(state, body), fields(kind = T::KIND.label()))]
pub async fn update_status<S, T>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(body): Json<StatusUpdate<T::Status>>,
) -> Result<Json<T>, ApiError>
where
    S: DocumentStore + Clone + 'static,
    T: StatusTracked + 'static,
    T::Status: DeserializeOwned + 'static,
{
    let updated = state
        .farm
        .update_status::<T>(&document_id(id), body.status)
        .await?;
    Ok(Json(updated))
}
