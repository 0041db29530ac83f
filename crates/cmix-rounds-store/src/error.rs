//! Error types for the store module.

use std::sync::PoisonError;

use cmix_rounds_core::RoundsError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No known rounds stored under this key.
    #[error("known rounds not found: {0}")]
    NotFound(String),

    /// Invalid data in storage, or a patch that does not fit the stored state.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Stored parts could not be turned back into known rounds.
    #[error("rounds error: {0}")]
    Rounds(#[from] RoundsError),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding store state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking database task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(e: PoisonError<T>) -> Self {
        StoreError::Poisoned(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Task(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
