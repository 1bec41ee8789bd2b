//! Background task mirroring the stored record into the cache.
//!
//! The watcher is the cache's only writer and the only way the cache can
//! converge with the store, so it never gives up: any stream failure is
//! logged and the watch is re-opened under exponential backoff.
//!
//! ```text
//! store watch ──> RecordWatcher ──> EntitlementCache::publish
//!      ^               │
//!      └── backoff ◄───┘ (stream error / close)
//! ```

use crate::backoff::{BackoffConfig, ExponentialBackoff};
use crate::cache::EntitlementCache;
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tollgate_store::{RecordEvent, RecordStore, StoreError};
use tracing::{debug, info, warn};

/// Mirrors the entitlement record into an [`EntitlementCache`].
pub struct RecordWatcher {
    store: RecordStore,
    cache: Arc<EntitlementCache>,
    backoff: BackoffConfig,
    failures: Arc<AtomicU64>,
}

impl RecordWatcher {
    /// Creates a watcher. Nothing runs until [`RecordWatcher::spawn`].
    pub fn new(store: RecordStore, cache: Arc<EntitlementCache>, backoff: BackoffConfig) -> Self {
        Self {
            store,
            cache,
            backoff,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Starts the watch loop on the current tokio runtime.
    pub fn spawn(self) -> WatcherHandle {
        self.spawn_with_token(CancellationToken::new())
    }

    /// Like [`RecordWatcher::spawn`], but the loop also stops when `cancel`
    /// (typically a child of the owner's token) is cancelled.
    pub fn spawn_with_token(self, cancel: CancellationToken) -> WatcherHandle {
        let failures = self.failures.clone();
        let task = tokio::spawn(self.run(cancel.clone()));
        WatcherHandle {
            cancel,
            task,
            failures,
        }
    }

    async fn run(self, cancel: CancellationToken) {
        info!(key = self.store.key(), "entitlement watcher started");
        let mut backoff = ExponentialBackoff::new(self.backoff.clone());

        loop {
            let err = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                err = self.watch_once(&mut backoff) => err,
            };
            self.failures.fetch_add(1, Ordering::Relaxed);

            let delay = backoff.next_delay();
            warn!(
                error = %err,
                retry_in_ms = delay.as_millis() as u64,
                "error from entitlement watch; retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(key = self.store.key(), "entitlement watcher stopped");
    }

    /// Consumes one watch stream until it fails. Always returns the failure.
    async fn watch_once(&self, backoff: &mut ExponentialBackoff) -> StoreError {
        let mut events = match self.store.watch().await {
            Ok(events) => events,
            Err(err) => return err,
        };
        debug!("entitlement watch opened");

        let mut synced = false;
        let mut replayed_record = false;
        while let Some(event) = events.next().await {
            match event {
                RecordEvent::Put { record, revision } => {
                    debug!(revision, expires = %record.expires, "observed entitlement record");
                    self.cache.publish(record, revision);
                    replayed_record |= !synced;
                }
                RecordEvent::Delete { revision } => {
                    debug!(revision, "observed entitlement deletion");
                    self.cache.publish_none(revision);
                }
                RecordEvent::Synced { revision } => {
                    // Deleted while we were not watching.
                    if !replayed_record {
                        self.cache.publish_none(revision);
                    }
                    synced = true;
                    continue;
                }
                RecordEvent::Error(err) => return err,
            }
            // A live change proves the stream is healthy again.
            if synced {
                backoff.reset();
            }
        }
        StoreError::WatchClosed
    }
}

/// Handle to a running [`RecordWatcher`].
#[derive(Debug)]
pub struct WatcherHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    failures: Arc<AtomicU64>,
}

impl WatcherHandle {
    /// Number of times the watch failed and was re-opened.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Returns true if the task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the watch loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "entitlement watcher task failed");
        }
    }
}
