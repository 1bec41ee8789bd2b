//! Error types for the store layer.

use crate::kv::Revision;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key not found. `revision` is the store revision at which the key
    /// was seen absent.
    #[error("key not found: {key} (revision {revision})")]
    NotFound { key: String, revision: Revision },

    /// Transaction failed to commit.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Watch stream could not be opened or reported a failure.
    #[error("watch error: {0}")]
    Watch(String),

    /// Watch stream ended without being asked to.
    #[error("watch closed unexpectedly")]
    WatchClosed,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this is a [`StoreError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns the revision at which a missing key was observed, if this is
    /// a [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found_revision(&self) -> Option<Revision> {
        match self {
            Self::NotFound { revision, .. } => Some(*revision),
            _ => None,
        }
    }
}
