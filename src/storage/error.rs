//! Storage-specific error types.
//!
//! All sink operations return [`StorageError`] on failure. The scheduler logs
//! and drops the batch; none of these variants stop collection.

use thiserror::Error;

/// Errors that can occur while talking to the time-series database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Transport failure (connection refused, DNS, timeout).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The database answered with a non-success status.
    #[error("database rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// JSON response could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sink configuration is unusable (bad URL, client build failure).
    #[error("invalid sink configuration: {0}")]
    Config(String),
}
