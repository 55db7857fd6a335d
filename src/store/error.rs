//! Error types for document store operations.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write would violate a unique index.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The connection lock was poisoned.
    #[error("Lock error: {0}")]
    Lock(String),

    /// A stored body is not a JSON object.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A collection or field name is not usable in an index name.
    #[error("Invalid name: {0}")]
    InvalidName(String),
}

impl StoreError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Lock(_) => true,
            Self::Database(err) => matches!(
                err.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }

    /// Maps a unique-constraint failure to [`StoreError::DuplicateKey`].
    pub(crate) fn from_write(err: rusqlite::Error, context: &str) -> Self {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            Self::DuplicateKey(format!("{context}: {err}"))
        } else {
            Self::Database(err)
        }
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
