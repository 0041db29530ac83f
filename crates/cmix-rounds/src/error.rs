//! Error types for the tracker.

use cmix_rounds_core::RoundsError;
use cmix_rounds_store::StoreError;
use thiserror::Error;

/// Errors that can occur during tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Known-rounds error, including wire decoding.
    #[error("rounds error: {0}")]
    Rounds(#[from] RoundsError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;
