//! Log store error types.

use path_guard::PathError;
use thiserror::Error;

use crate::BackendKind;

/// Errors that can occur during log store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Unrecognized backend kind in configuration.
    #[error("unknown storage backend: {value:?}. Expected one of: {}", BackendKind::ACCEPTED.join(", "))]
    UnknownBackend { value: String },

    /// A backend was selected without its required connection string.
    #[error("{setting} must be set to use the {kind} backend")]
    MissingConnectionString {
        kind: BackendKind,
        setting: &'static str,
    },

    /// A configured file path was rejected by the path guard.
    #[error("invalid {setting}: {source}")]
    InvalidPath {
        setting: &'static str,
        #[source]
        source: PathError,
    },

    /// File system error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error, tagged with the operation that failed.
    #[error("failed to {operation}: {source}")]
    Database {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Background blocking task failed to complete.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// Returns a mapper wrapping a database error with the failed operation.
    pub fn database(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { operation, source }
    }
}

/// Result type for log store operations.
pub type StorageResult<T> = Result<T, StorageError>;
