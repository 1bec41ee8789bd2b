//! In-process key-value backend.
//!
//! Several services sharing one `Arc<MemoryKv>` behave like several replicas
//! sharing one cluster store. The fault injection hooks let tests break the
//! watch stream and transactions on demand.

use crate::error::{StoreError, StoreResult};
use crate::kv::{KvBackend, KvEvent, KvWatchStream, Revision, Txn, TxnFn};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the change notification buffer. A watcher that falls further
/// behind than this receives an error event.
const NOTIFY_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Notification {
    Put {
        key: String,
        value: Vec<u8>,
        revision: Revision,
    },
    Delete {
        key: String,
        revision: Revision,
    },
    Error(String),
    Close,
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    mod_revision: Revision,
}

#[derive(Debug, Default)]
struct State {
    data: BTreeMap<String, Entry>,
    revision: Revision,
}

enum Op {
    Put(String, Vec<u8>),
    Delete(String),
}

/// Buffers a transaction's mutations against a read-only view of the data.
struct MemTxn<'a> {
    data: &'a BTreeMap<String, Entry>,
    revision: Revision,
    staged: BTreeMap<String, bool>,
    ops: Vec<Op>,
}

impl<'a> MemTxn<'a> {
    fn new(data: &'a BTreeMap<String, Entry>, revision: Revision) -> Self {
        Self {
            data,
            revision,
            staged: BTreeMap::new(),
            ops: Vec::new(),
        }
    }

    fn exists(&self, key: &str) -> bool {
        self.staged
            .get(key)
            .copied()
            .unwrap_or_else(|| self.data.contains_key(key))
    }
}

impl Txn for MemTxn<'_> {
    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.staged.insert(key.to_string(), true);
        self.ops.push(Op::Put(key.to_string(), value));
    }

    fn delete(&mut self, key: &str) -> StoreResult<()> {
        if !self.exists(key) {
            return Err(StoreError::NotFound {
                key: key.to_string(),
                revision: self.revision,
            });
        }
        self.staged.insert(key.to_string(), false);
        self.ops.push(Op::Delete(key.to_string()));
        Ok(())
    }
}

/// An in-memory [`KvBackend`].
#[derive(Debug)]
pub struct MemoryKv {
    state: Mutex<State>,
    notifier: broadcast::Sender<Notification>,
    transactions: AtomicU64,
    watches_opened: AtomicU64,
    failing_watch_opens: AtomicU32,
    fail_next_transaction: AtomicBool,
}

impl MemoryKv {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            state: Mutex::new(State::default()),
            notifier,
            transactions: AtomicU64::new(0),
            watches_opened: AtomicU64::new(0),
            failing_watch_opens: AtomicU32::new(0),
            fail_next_transaction: AtomicBool::new(false),
        }
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock()
            .ok()
            .and_then(|state| state.data.get(key).map(|e| e.value.clone()))
    }

    /// Returns the current store revision.
    #[must_use]
    pub fn revision(&self) -> Revision {
        self.lock().map(|state| state.revision).unwrap_or_default()
    }

    /// Number of committed transactions that mutated data.
    #[must_use]
    pub fn transaction_count(&self) -> u64 {
        self.transactions.load(Ordering::SeqCst)
    }

    /// Number of watch streams successfully opened.
    #[must_use]
    pub fn watch_count(&self) -> u64 {
        self.watches_opened.load(Ordering::SeqCst)
    }

    /// Delivers an error event to every open watch.
    pub fn inject_watch_error(&self, message: impl Into<String>) {
        let _ = self.notifier.send(Notification::Error(message.into()));
    }

    /// Ends every open watch stream as if the connection dropped.
    pub fn close_watches(&self) {
        let _ = self.notifier.send(Notification::Close);
    }

    /// Makes the next `count` calls to `watch` fail.
    pub fn fail_watch_opens(&self, count: u32) {
        self.failing_watch_opens.store(count, Ordering::SeqCst);
    }

    /// Makes the next transaction fail before it runs.
    pub fn fail_next_transaction(&self) {
        self.fail_next_transaction.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Transaction("store lock poisoned".to_string()))
    }

    fn take_watch_failure(&self) -> bool {
        self.failing_watch_opens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryKv {
    async fn transact(&self, f: TxnFn) -> StoreResult<Revision> {
        if self.fail_next_transaction.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transaction("injected transaction failure".to_string()));
        }

        let mut state = self.lock()?;
        let ops = {
            let mut txn = MemTxn::new(&state.data, state.revision);
            f(&mut txn)?;
            txn.ops
        };
        if ops.is_empty() {
            return Ok(state.revision);
        }

        state.revision += 1;
        let revision = state.revision;
        let mut notifications = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                Op::Put(key, value) => {
                    state.data.insert(
                        key.clone(),
                        Entry {
                            value: value.clone(),
                            mod_revision: revision,
                        },
                    );
                    notifications.push(Notification::Put {
                        key,
                        value,
                        revision,
                    });
                }
                Op::Delete(key) => {
                    state.data.remove(&key);
                    notifications.push(Notification::Delete { key, revision });
                }
            }
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);

        // Sent under the lock so watchers see commits in revision order.
        for notification in notifications {
            let _ = self.notifier.send(notification);
        }
        debug!(revision, "committed transaction");
        Ok(revision)
    }

    async fn watch(&self, prefix: &str) -> StoreResult<KvWatchStream> {
        if self.take_watch_failure() {
            return Err(StoreError::Watch("injected watch failure".to_string()));
        }

        let (initial, rx) = {
            let state = self.lock()?;
            let mut initial: Vec<KvEvent> = state
                .data
                .range(prefix.to_string()..)
                .take_while(|(key, _)| key.starts_with(prefix))
                .map(|(key, entry)| KvEvent::Put {
                    key: key.clone(),
                    value: entry.value.clone(),
                    revision: entry.mod_revision,
                })
                .collect();
            initial.push(KvEvent::Synced {
                revision: state.revision,
            });
            (initial, self.notifier.subscribe())
        };
        self.watches_opened.fetch_add(1, Ordering::SeqCst);

        let prefix = prefix.to_string();
        let live = futures::stream::unfold(Some(rx), move |rx| {
            let prefix = prefix.clone();
            async move {
                let mut rx = rx?;
                loop {
                    match rx.recv().await {
                        Ok(Notification::Put {
                            key,
                            value,
                            revision,
                        }) if key.starts_with(&prefix) => {
                            return Some((
                                KvEvent::Put {
                                    key,
                                    value,
                                    revision,
                                },
                                Some(rx),
                            ));
                        }
                        Ok(Notification::Delete { key, revision }) if key.starts_with(&prefix) => {
                            return Some((KvEvent::Delete { key, revision }, Some(rx)));
                        }
                        Ok(Notification::Error(message)) => {
                            return Some((KvEvent::Error(StoreError::Watch(message)), Some(rx)));
                        }
                        Ok(Notification::Close) | Err(broadcast::error::RecvError::Closed) => {
                            return None;
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            let err = StoreError::Watch(format!("watcher lagged by {missed} events"));
                            return Some((KvEvent::Error(err), None));
                        }
                    }
                }
            }
        });

        Ok(futures::stream::iter(initial).chain(live).boxed())
    }
}
