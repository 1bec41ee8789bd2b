//! Shared helpers for entitlement service tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tollgate_entitlement::{
    BackoffConfig, DataPurger, EntitlementConfig, EntitlementService, NoopPurger, PurgeError,
};
use tollgate_license::ActivationValidator;
use tollgate_store::MemoryKv;

pub const RECORD_PATH: &str = "/enterprise/token";

const TEST_SIGNING_KEY_PEM: &str = include_str!("../../../../testdata/activation_signing_key.pem");
const ROGUE_SIGNING_KEY_PEM: &str = include_str!("../../../../testdata/rogue_signing_key.pem");

fn load(pem: &str) -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(pem).unwrap()
}

/// Fixed signing key trusted by [`test_validator`].
pub fn signing_key() -> SigningKey<Sha256> {
    SigningKey::<Sha256>::new(load(TEST_SIGNING_KEY_PEM))
}

/// A key nobody trusts.
pub fn rogue_key() -> SigningKey<Sha256> {
    SigningKey::<Sha256>::new(load(ROGUE_SIGNING_KEY_PEM))
}

pub fn test_validator() -> ActivationValidator {
    ActivationValidator::from_public_key(RsaPublicKey::from(&load(TEST_SIGNING_KEY_PEM)))
}

/// Creates an activation code signed by `key` expiring at `expiry`.
pub fn make_code_with(key: &SigningKey<Sha256>, expiry: DateTime<Utc>) -> String {
    let token = serde_json::json!({
        "Expiry": expiry.to_rfc3339_opts(SecondsFormat::Millis, true)
    })
    .to_string();
    let signature = key.sign(token.as_bytes());
    let envelope = serde_json::json!({
        "Token": token,
        "Signature": STANDARD.encode(signature.to_bytes()),
    });
    STANDARD.encode(envelope.to_string())
}

pub fn make_code(expiry: DateTime<Utc>) -> String {
    make_code_with(&signing_key(), expiry)
}

/// Whole seconds from now, so it survives the code's millisecond encoding.
pub fn seconds_from_now(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(Utc::now().timestamp() + secs, 0).unwrap()
}

/// Millisecond-scale timings so tests finish quickly.
pub fn fast_config() -> EntitlementConfig {
    EntitlementConfig {
        poll_interval_ms: 5,
        convergence_timeout_ms: Some(5_000),
        grace_period_ms: 0,
        watch_backoff: BackoffConfig {
            initial_ms: 5,
            multiplier: 2.0,
            max_ms: 50,
        },
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn start_replica(kv: &Arc<MemoryKv>) -> EntitlementService {
    start_replica_with(kv, Arc::new(NoopPurger), fast_config())
}

pub fn start_replica_with(
    kv: &Arc<MemoryKv>,
    purger: Arc<dyn DataPurger>,
    config: EntitlementConfig,
) -> EntitlementService {
    init_tracing();
    EntitlementService::start(kv.clone(), test_validator(), purger, config)
}

/// Polls `cond` every few milliseconds for up to five seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..1_000 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Counts calls to `delete_all`.
#[derive(Debug, Default)]
pub struct CountingPurger {
    calls: AtomicU32,
}

impl CountingPurger {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataPurger for CountingPurger {
    async fn delete_all(&self) -> Result<(), PurgeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Always fails.
#[derive(Debug, Default)]
pub struct FailingPurger;

#[async_trait]
impl DataPurger for FailingPurger {
    async fn delete_all(&self) -> Result<(), PurgeError> {
        Err(PurgeError("object store unavailable".to_string()))
    }
}
