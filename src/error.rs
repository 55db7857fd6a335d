//! Error types for user and beacon operations.
//!
//! Store failures never escape as panics: every operation returns a
//! [`CoreError`] value. A mutation the store accepted but that changed
//! nothing is not an error; it is reported as [`Mutation::NoOp`].

use thiserror::Error;

use crate::store::StoreError;

/// Error type for core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Another user already holds this username.
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Usernames must be non-empty.
    #[error("Invalid username: {0:?}")]
    InvalidUsername(String),

    /// The user has no credential digest and cannot be persisted.
    #[error("Empty credential for user: {0}")]
    EmptyCredential(String),

    /// The creator already has a beacon that has not ended.
    #[error("Active beacon already exists for creator: {0}")]
    ActiveBeaconExists(String),

    /// No user matched the lookup.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// No beacon matched the lookup.
    #[error("Beacon not found: {0}")]
    BeaconNotFound(String),

    /// Coordinates out of range.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// A beacon range must be finite and positive.
    #[error("Invalid range: {0} miles")]
    InvalidRange(f64),

    /// Hashing or verifying a password failed.
    #[error("Credential error: {0}")]
    Credential(String),

    /// An entity could not be converted to or from a document.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The document store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// Whether retrying the same call may succeed.
    ///
    /// Conflicts and missing entities are permanent until something else
    /// changes; only transient store conditions are retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Outcome of a mutation the store accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// The persisted document changed and the in-memory value follows it.
    Updated,
    /// Nothing changed: already in the requested state, or no document
    /// matched.
    NoOp,
}

impl Mutation {
    /// Maps a store modified-count to a mutation outcome.
    #[must_use]
    pub const fn from_modified(modified_count: u64) -> Self {
        if modified_count > 0 {
            Self::Updated
        } else {
            Self::NoOp
        }
    }

    /// Whether the persisted document changed.
    #[must_use]
    pub const fn is_updated(self) -> bool {
        matches!(self, Self::Updated)
    }
}
