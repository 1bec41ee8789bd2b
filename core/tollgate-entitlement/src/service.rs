//! The entitlement service: activate, deactivate and read state.
//!
//! Reads come from the local cache only. Writes go to the store and are not
//! acknowledged until the local watcher has mirrored them, so a caller that
//! activates and then reads on the same replica always sees its own write
//! (or a later one).
//!
//! After local convergence each write also waits out a short grace period.
//! That gives other replicas time to observe the write, but proves nothing
//! about them: a read on another replica right after `activate` returns may
//! still see the old state.

use crate::api::{ActivateRequest, ActivateResponse, DeactivateResponse, GetStateResponse};
use crate::cache::{CachedRecord, EntitlementCache};
use crate::config::EntitlementConfig;
use crate::error::{EntitlementError, EntitlementResult};
use crate::purge::DataPurger;
use crate::state::EntitlementState;
use crate::watcher::{RecordWatcher, WatcherHandle};
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tollgate_license::ActivationValidator;
use tollgate_store::{EntitlementRecord, KvBackend, RecordStore};
use tracing::{debug, info, warn};

/// Entitlement service for one replica.
///
/// Owns its cache and its watcher; several instances may share one store
/// (and one process) without interfering.
pub struct EntitlementService {
    validator: ActivationValidator,
    store: RecordStore,
    cache: Arc<EntitlementCache>,
    purger: Arc<dyn DataPurger>,
    config: EntitlementConfig,
    shutdown: CancellationToken,
    watcher: Mutex<Option<WatcherHandle>>,
}

impl EntitlementService {
    /// Creates the service and starts its watcher on the current tokio
    /// runtime.
    pub fn start(
        backend: Arc<dyn KvBackend>,
        validator: ActivationValidator,
        purger: Arc<dyn DataPurger>,
        config: EntitlementConfig,
    ) -> Self {
        let store = RecordStore::new(backend, config.key_prefix.clone());
        let cache = Arc::new(EntitlementCache::new());
        let shutdown = CancellationToken::new();
        let watcher = RecordWatcher::new(store.clone(), cache.clone(), config.watch_backoff.clone())
            .spawn_with_token(shutdown.child_token());
        info!(key = store.key(), "entitlement service started");

        Self {
            validator,
            store,
            cache,
            purger,
            config,
            shutdown,
            watcher: Mutex::new(Some(watcher)),
        }
    }

    /// Returns this replica's cache.
    pub fn cache(&self) -> &Arc<EntitlementCache> {
        &self.cache
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EntitlementConfig {
        &self.config
    }

    /// Number of times this replica's watch failed and was re-opened.
    pub fn watch_failures(&self) -> u64 {
        self.watcher
            .lock()
            .ok()
            .and_then(|w| w.as_ref().map(WatcherHandle::failures))
            .unwrap_or_default()
    }

    /// Validates an activation code and stores it as the cluster's
    /// entitlement.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::ActivationRejected`] if the code is invalid; the
    ///   store is not touched
    /// - [`EntitlementError::InvalidOverride`] if `expires` is not after the epoch
    /// - [`EntitlementError::Store`] if the write fails
    /// - [`EntitlementError::ConvergenceTimeout`] or
    ///   [`EntitlementError::ShuttingDown`] if the write was stored but not
    ///   observed locally
    pub async fn activate(&self, req: ActivateRequest) -> EntitlementResult<ActivateResponse> {
        let started = Instant::now();
        info!(
            code_len = req.activation_code.len(),
            expires_override = ?req.expires,
            "activate request"
        );
        let result = self.activate_inner(req).await;
        log_outcome("activate", started, &result);
        result
    }

    async fn activate_inner(&self, req: ActivateRequest) -> EntitlementResult<ActivateResponse> {
        let mut expires = self.validator.validate(&req.activation_code)?;

        // The override can only shorten what the code authorizes.
        if let Some(custom) = req.expires {
            if custom <= DateTime::<Utc>::UNIX_EPOCH {
                return Err(EntitlementError::InvalidOverride(format!(
                    "{} is not after the Unix epoch",
                    custom.to_rfc3339()
                )));
            }
            if custom < expires {
                expires = custom;
            }
        }

        let record = EntitlementRecord::new(req.activation_code, expires);
        let revision = self.store.put(&record).await?;
        debug!(revision, "entitlement record written");

        self.await_convergence("activation", |cached| cached.revision >= revision)
            .await?;
        self.grace_pause().await?;

        Ok(ActivateResponse { expires })
    }

    /// Wipes all application data and removes the cluster's entitlement.
    ///
    /// Deactivating a cluster with no entitlement succeeds.
    ///
    /// # Errors
    ///
    /// - [`EntitlementError::Purge`] if the data wipe fails; the record is kept
    /// - [`EntitlementError::Store`] if the delete fails
    /// - [`EntitlementError::ConvergenceTimeout`] or
    ///   [`EntitlementError::ShuttingDown`] if the delete was not observed locally
    pub async fn deactivate(&self) -> EntitlementResult<DeactivateResponse> {
        let started = Instant::now();
        info!("deactivate request");
        let result = self.deactivate_inner().await;
        log_outcome("deactivate", started, &result);
        result
    }

    async fn deactivate_inner(&self) -> EntitlementResult<DeactivateResponse> {
        self.purger
            .delete_all()
            .await
            .map_err(|e| EntitlementError::Purge(e.to_string()))?;

        match self.store.delete().await {
            Ok(revision) => {
                debug!(revision, "entitlement record deleted");
                self.await_convergence("deactivation", |cached| cached.revision >= revision)
                    .await?;
            }
            Err(err) => {
                let Some(absent_at) = err.not_found_revision() else {
                    return Err(err.into());
                };
                debug!(absent_at, "no entitlement record to delete");
                // Either the absence or any write made after it will do.
                self.await_convergence("deactivation", |cached| {
                    cached.record.is_none() || cached.revision > absent_at
                })
                .await?;
            }
        }
        self.grace_pause().await?;

        Ok(DeactivateResponse {})
    }

    /// Reports the entitlement state from the local cache. Never waits.
    pub fn get_state(&self) -> GetStateResponse {
        let started = Instant::now();
        let snapshot = self.cache.load();
        let state = EntitlementState::derive(&snapshot.record, Utc::now());

        let response = match state {
            EntitlementState::None => GetStateResponse {
                state,
                activation_code: None,
                expires: None,
            },
            EntitlementState::Active | EntitlementState::Expired => GetStateResponse {
                state,
                activation_code: Some(snapshot.record.activation_code.clone()),
                expires: Some(snapshot.record.expires),
            },
        };
        debug!(
            ?state,
            revision = snapshot.revision,
            elapsed_us = started.elapsed().as_micros() as u64,
            "get_state"
        );
        response
    }

    /// Stops the watcher. In-flight writes waiting for convergence fail
    /// with [`EntitlementError::ShuttingDown`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.watcher.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            handle.shutdown().await;
            info!(key = self.store.key(), "entitlement service stopped");
        }
    }

    /// Polls the cache until `converged` holds, bounded by the configured
    /// timeout and by shutdown.
    async fn await_convergence(
        &self,
        operation: &'static str,
        converged: impl Fn(&CachedRecord) -> bool,
    ) -> EntitlementResult<()> {
        let started = Instant::now();
        let interval = self.config.poll_interval();

        let poll = async {
            loop {
                if converged(self.cache.load().as_ref()) {
                    return;
                }
                debug!(operation, "waiting for local replica to observe write");
                tokio::time::sleep(interval).await;
            }
        };
        let bounded = async {
            match self.config.convergence_timeout() {
                Some(limit) => tokio::time::timeout(limit, poll).await.map_err(|_| {
                    EntitlementError::ConvergenceTimeout {
                        operation,
                        waited_ms: started.elapsed().as_millis() as u64,
                    }
                }),
                None => {
                    poll.await;
                    Ok(())
                }
            }
        };

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(EntitlementError::ShuttingDown),
            result = bounded => result,
        }
    }

    /// Gives other replicas a moment to observe the write.
    async fn grace_pause(&self) -> EntitlementResult<()> {
        let grace = self.config.grace_period();
        if grace.is_zero() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(EntitlementError::ShuttingDown),
            _ = tokio::time::sleep(grace) => Ok(()),
        }
    }
}

impl Drop for EntitlementService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn log_outcome<T: Debug>(operation: &'static str, started: Instant, result: &EntitlementResult<T>) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(response) => info!(operation, elapsed_ms, ?response, "request succeeded"),
        Err(err) => warn!(operation, elapsed_ms, error = %err, "request failed"),
    }
}
