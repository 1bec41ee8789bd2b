//! Cluster entitlement state for Tollgate.
//!
//! Every replica of the service keeps a lock-free snapshot of the cluster's
//! entitlement record, fed by a watch on the shared store. Reads never touch
//! the store; writes go to the store and are acknowledged only once this
//! replica's own watch has observed them.
//!
//! ## Components
//!
//! - **Cache**: single-writer, many-reader snapshot of the record
//! - **Watcher**: background task mirroring the store into the cache,
//!   restarting under exponential backoff whenever the stream fails
//! - **Service**: `activate`, `deactivate` and `get_state`
//!
//! ## Write Path
//!
//! 1. Validate the activation code offline
//! 2. Blind-write the record in a store transaction
//! 3. Poll the cache until it reaches the write's revision
//! 4. Pause briefly so other replicas can catch up
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tollgate_entitlement::{EntitlementConfig, EntitlementService, NoopPurger};
//! use tollgate_license::ActivationValidator;
//! use tollgate_store::MemoryKv;
//!
//! # async fn run() {
//! let service = EntitlementService::start(
//!     Arc::new(MemoryKv::new()),
//!     ActivationValidator::embedded(),
//!     Arc::new(NoopPurger),
//!     EntitlementConfig::default(),
//! );
//! let state = service.get_state();
//! println!("{:?}", state.state);
//! service.shutdown().await;
//! # }
//! ```

mod api;
mod backoff;
mod cache;
mod config;
mod error;
mod purge;
mod service;
mod state;
mod watcher;

pub use api::{ActivateRequest, ActivateResponse, DeactivateResponse, GetStateResponse};
pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use cache::{CachedRecord, EntitlementCache};
pub use config::EntitlementConfig;
pub use error::{EntitlementError, EntitlementResult};
pub use purge::{DataPurger, NoopPurger, PurgeError};
pub use service::EntitlementService;
pub use state::EntitlementState;
pub use watcher::{RecordWatcher, WatcherHandle};
