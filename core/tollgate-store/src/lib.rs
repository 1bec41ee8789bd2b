//! Entitlement record persistence for Tollgate.
//!
//! The cluster keeps exactly one [`EntitlementRecord`] in a shared,
//! transactional key-value store. This crate provides:
//!
//! - The [`KvBackend`] contract the store must satisfy (atomic transactions
//!   plus an ordered watch stream)
//! - [`MemoryKv`], an in-process backend for tests and local simulation
//! - [`RecordStore`], the adapter that scopes the record's key and encodes it
//!
//! # Architecture
//!
//! - Writes are blind: `put` overwrites whatever is there
//! - Every mutating commit advances a store-wide [`Revision`]
//! - A watch replays current state first, then streams changes in commit order

mod error;
mod kv;
mod memory;
mod record;
mod record_store;

pub use error::{StoreError, StoreResult};
pub use kv::{KvBackend, KvEvent, KvWatchStream, Revision, Txn, TxnFn};
pub use memory::MemoryKv;
pub use record::EntitlementRecord;
pub use record_store::{RecordEvent, RecordStore, RecordWatch, RECORD_KEY};
