//! Application data wipe, run before deactivation.

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a [`DataPurger`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PurgeError(pub String);

/// Deletes all application data in the cluster.
///
/// Deactivation calls this before touching the entitlement record, so that
/// data created under an entitlement never outlives it.
#[async_trait]
pub trait DataPurger: Send + Sync {
    /// Deletes everything.
    async fn delete_all(&self) -> Result<(), PurgeError>;
}

/// A purger for deployments that keep no application data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPurger;

#[async_trait]
impl DataPurger for NoopPurger {
    async fn delete_all(&self) -> Result<(), PurgeError> {
        Ok(())
    }
}
