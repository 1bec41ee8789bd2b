//! Typed access to the single entitlement record.

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvBackend, KvEvent, Revision};
use crate::record::EntitlementRecord;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;

/// Key of the entitlement record, relative to the configured prefix.
pub const RECORD_KEY: &str = "token";

/// A change to the entitlement record.
#[derive(Debug)]
pub enum RecordEvent {
    /// The record was written.
    Put {
        record: EntitlementRecord,
        revision: Revision,
    },
    /// The record was deleted.
    Delete { revision: Revision },
    /// Current state has been replayed as of `revision`. If no `Put` came
    /// before this, there is no record.
    Synced { revision: Revision },
    /// The underlying watch failed.
    Error(StoreError),
}

/// Stream of [`RecordEvent`]s. Dropping it closes the watch.
pub type RecordWatch = BoxStream<'static, RecordEvent>;

/// Reads and writes the entitlement record under a key prefix.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KvBackend>,
    prefix: String,
    key: String,
}

impl RecordStore {
    /// Creates a record store rooted at `prefix` (e.g. `/enterprise`).
    pub fn new(backend: Arc<dyn KvBackend>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        let key = format!("{prefix}/{RECORD_KEY}");
        Self {
            backend,
            prefix,
            key,
        }
    }

    /// Returns the full key of the record.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Blind-writes `record`, replacing whatever is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or the transaction fails.
    pub async fn put(&self, record: &EntitlementRecord) -> StoreResult<Revision> {
        let value = serde_json::to_vec(record)?;
        let key = self.key.clone();
        self.backend
            .transact(Box::new(move |txn| {
                txn.put(&key, value);
                Ok(())
            }))
            .await
    }

    /// Deletes the record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no record, or the
    /// transaction error if the commit fails.
    pub async fn delete(&self) -> StoreResult<Revision> {
        let key = self.key.clone();
        self.backend
            .transact(Box::new(move |txn| txn.delete(&key)))
            .await
    }

    /// Opens a watch on the record.
    ///
    /// The stream starts with the record's current value if one exists,
    /// followed by [`RecordEvent::Synced`]. Other keys under the prefix are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot open the watch.
    pub async fn watch(&self) -> StoreResult<RecordWatch> {
        let stream = self.backend.watch(&self.prefix).await?;
        let key = self.key.clone();
        let events = stream.filter_map(move |event| {
            let decoded = match event {
                KvEvent::Put {
                    key: k,
                    value,
                    revision,
                } if k == key => Some(match serde_json::from_slice(&value) {
                    Ok(record) => RecordEvent::Put { record, revision },
                    Err(e) => RecordEvent::Error(StoreError::Serialization(e)),
                }),
                KvEvent::Delete { key: k, revision } if k == key => {
                    Some(RecordEvent::Delete { revision })
                }
                KvEvent::Synced { revision } => Some(RecordEvent::Synced { revision }),
                KvEvent::Error(err) => Some(RecordEvent::Error(err)),
                _ => None,
            };
            futures::future::ready(decoded)
        });
        Ok(events.boxed())
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
