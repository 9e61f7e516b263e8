//! Report endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::NaiveDate;
use document_store::DocumentStore;
use reports::{DateRange, ReportKind, ReportTable};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

/// GET /reports: the report names accepted by `/reports/{kind}`.
pub async fn index() -> Json<Vec<&'static str>> {
    Json(ReportKind::ALL.iter().map(ReportKind::slug).collect())
}

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /reports/{kind}?from=YYYY-MM-DD&to=YYYY-MM-DD
#[tracing::instrument(skip(state))]
pub async fn build<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(kind): Path<String>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ReportTable>, ApiError> {
    let kind: ReportKind = kind.parse()?;
    let range = DateRange::new(params.from, params.to)?;
    Ok(Json(state.reports.build(kind, range).await?))
}
