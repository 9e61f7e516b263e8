//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::DocumentStoreError;
use domain::DomainError;
use reports::ReportError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Report error.
    #[error(transparent)]
    Report(#[from] ReportError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Status code and a stable machine-readable code for the body.
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Domain(err) => classify_domain(err),
            ApiError::Report(err) => match err {
                ReportError::Domain(err) => classify_domain(err),
                ReportError::InvalidRange { .. } => (StatusCode::BAD_REQUEST, "invalid_range"),
                ReportError::UnknownReport(_) => (StatusCode::NOT_FOUND, "unknown_report"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

fn classify_domain(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::NotFound { .. } | DomainError::Store(DocumentStoreError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        DomainError::InsufficientStock { .. } => (StatusCode::CONFLICT, "insufficient_stock"),
        DomainError::InvalidStatusTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_status_transition")
        }
        DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, "concurrency_conflict")
        }
        DomainError::Store(DocumentStoreError::AlreadyExists(_)) => {
            (StatusCode::CONFLICT, "already_exists")
        }
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
        } else {
            tracing::debug!(error = %message, %code, "request rejected");
        }
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use common::DocumentId;
    use document_store::{DocumentKey, Version};

    use super::*;

    #[test]
    fn stock_and_transition_errors_are_conflicts() {
        let insufficient = ApiError::from(DomainError::InsufficientStock {
            product_id: DocumentId::new("p1"),
            product_name: "Urea".to_string(),
            requested: 10.0,
            available: 2.0,
        });
        assert_eq!(insufficient.classify().0, StatusCode::CONFLICT);

        let conflict = ApiError::from(DomainError::Store(
            DocumentStoreError::ConcurrencyConflict {
                key: DocumentKey::new("products", "p1"),
                expected: Version::first(),
                actual: Version::new(2),
            },
        ));
        assert_eq!(conflict.classify(), (StatusCode::CONFLICT, "concurrency_conflict"));
    }

    #[test]
    fn missing_records_are_not_found() {
        let missing = ApiError::from(DomainError::not_found("Harvest", &DocumentId::new("h1")));
        assert_eq!(missing.classify().0, StatusCode::NOT_FOUND);

        let unknown = ApiError::from(ReportError::UnknownReport("profit".to_string()));
        assert_eq!(unknown.classify().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_is_bad_request() {
        let invalid = ApiError::from(DomainError::validation("quantity must be positive"));
        assert_eq!(invalid.classify(), (StatusCode::BAD_REQUEST, "validation"));
    }
}
