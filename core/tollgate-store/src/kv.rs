//! Key-value backend contract.
//!
//! Defines what the shared store must offer so that any engine with atomic
//! transactions and ordered change notifications can hold the record.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Store-wide commit sequence number. Zero means "nothing committed yet".
pub type Revision = u64;

/// Mutations available inside a transaction.
pub trait Txn {
    /// Writes `value` under `key`, replacing any previous value.
    fn put(&mut self, key: &str, value: Vec<u8>);

    /// Deletes `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`], carrying the revision the
    /// transaction read at, if the key does not exist.
    fn delete(&mut self, key: &str) -> StoreResult<()>;
}

/// The body of a transaction. Returning an error aborts it.
pub type TxnFn = Box<dyn FnOnce(&mut dyn Txn) -> StoreResult<()> + Send>;

/// A change notification delivered by a watch.
#[derive(Debug)]
pub enum KvEvent {
    /// `key` now holds `value`.
    Put {
        key: String,
        value: Vec<u8>,
        revision: Revision,
    },
    /// `key` was removed.
    Delete { key: String, revision: Revision },
    /// Every key under the prefix has been replayed as of `revision`; later
    /// events are live changes.
    Synced { revision: Revision },
    /// The watch hit a failure. Events after this one may be missing.
    Error(StoreError),
}

/// A watch subscription. Dropping it closes the watch.
pub type KvWatchStream = BoxStream<'static, KvEvent>;

/// A transactional key-value store with change notifications.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Runs `f` atomically: either every mutation it made is committed or
    /// none is.
    ///
    /// Returns the store revision after the commit. A transaction that
    /// mutated nothing returns the current revision unchanged.
    async fn transact(&self, f: TxnFn) -> StoreResult<Revision>;

    /// Opens a watch on every key starting with `prefix`.
    ///
    /// The stream first yields the current value of each matching key as a
    /// `Put`, then a single `Synced`, then every later change in commit order.
    async fn watch(&self, prefix: &str) -> StoreResult<KvWatchStream>;
}

#[async_trait]
impl<T: KvBackend + ?Sized> KvBackend for Arc<T> {
    async fn transact(&self, f: TxnFn) -> StoreResult<Revision> {
        (**self).transact(f).await
    }

    async fn watch(&self, prefix: &str) -> StoreResult<KvWatchStream> {
        (**self).watch(prefix).await
    }
}
