//! Report error types.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Loading the records failed.
    #[error("Domain error: {0}")]
    Domain(#[from] domain::DomainError),

    /// The requested period ends before it starts.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },

    /// No report has this name.
    #[error("Unknown report: {0}")]
    UnknownReport(String),
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
