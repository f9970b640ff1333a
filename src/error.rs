//! Error types for hex aggregation and map sessions.

use thiserror::Error;

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Point outside the valid latitude/longitude range
    #[error("invalid coordinate: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Resolution outside what the kernel supports for the operation
    #[error("invalid resolution: {0}")]
    InvalidResolution(i64),

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid row: {0}")]
    InvalidRow(String),

    #[error("invalid styling thresholds: {0}")]
    InvalidThresholds(String),

    /// Reported by the row source collaborator
    #[error("load failed: {0}")]
    LoadFailure(String),

    #[error("a load is already in progress")]
    LoadInProgress,

    /// Ticket does not belong to the pending load
    #[error("load ticket is stale")]
    StaleLoad,

    #[error("config error: {0}")]
    Config(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
