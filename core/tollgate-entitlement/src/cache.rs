//! Lock-free snapshot of the entitlement record.
//!
//! One writer (the record watcher) and any number of readers. Readers load
//! an `Arc` snapshot through [`arc_swap::ArcSwap`] and never block the
//! writer; the writer swaps in a whole new snapshot and never blocks readers.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tollgate_store::{EntitlementRecord, Revision};

/// The cached record and the store revision it was observed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    /// Latest record seen by the watcher (the sentinel when absent).
    pub record: EntitlementRecord,
    /// Revision of the event that produced `record`; 0 before any event.
    pub revision: Revision,
}

/// Process-local replica of the cluster's entitlement record.
#[derive(Debug)]
pub struct EntitlementCache {
    slot: ArcSwap<CachedRecord>,
}

impl EntitlementCache {
    /// Creates a cache holding the "no entitlement" sentinel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: ArcSwap::from_pointee(CachedRecord {
                record: EntitlementRecord::none(),
                revision: 0,
            }),
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn load(&self) -> Arc<CachedRecord> {
        self.slot.load_full()
    }

    /// Returns the revision of the current snapshot.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.slot.load().revision
    }

    /// Replaces the snapshot. Only the record watcher calls this.
    pub(crate) fn publish(&self, record: EntitlementRecord, revision: Revision) {
        self.slot.store(Arc::new(CachedRecord { record, revision }));
    }

    /// Replaces the snapshot with the sentinel.
    pub(crate) fn publish_none(&self, revision: Revision) {
        self.publish(EntitlementRecord::none(), revision);
    }
}

impl Default for EntitlementCache {
    fn default() -> Self {
        Self::new()
    }
}
