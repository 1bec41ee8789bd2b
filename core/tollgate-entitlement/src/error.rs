//! Error types for the entitlement service.

use thiserror::Error;
use tollgate_license::LicenseError;
use tollgate_store::StoreError;

/// Result type for entitlement operations.
pub type EntitlementResult<T> = Result<T, EntitlementError>;

/// Errors returned to callers of the entitlement service.
#[derive(Debug, Error)]
pub enum EntitlementError {
    /// The activation code failed validation.
    #[error("error validating activation code: {0}")]
    ActivationRejected(#[from] LicenseError),

    /// The requested expiry override is unusable.
    #[error("invalid expiry override: {0}")]
    InvalidOverride(String),

    /// The store rejected a write.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Application data could not be wiped.
    #[error("could not delete application data: {0}")]
    Purge(String),

    /// The local cache did not reflect the write in time.
    #[error("{operation} not observed by the local replica after {waited_ms}ms")]
    ConvergenceTimeout {
        operation: &'static str,
        waited_ms: u64,
    },

    /// The service is shutting down.
    #[error("entitlement service is shutting down")]
    ShuttingDown,
}
