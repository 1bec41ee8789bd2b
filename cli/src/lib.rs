//! Building blocks of the `tollgate` binary.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{fs, path::Path, sync::Arc};
use tollgate_entitlement::{
    ActivateRequest, ActivateResponse, EntitlementConfig, EntitlementService, GetStateResponse,
    NoopPurger,
};
use tollgate_license::ActivationValidator;
use tollgate_store::MemoryKv;
use tracing::info;

/// What each replica reported during a simulation run.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub activated: ActivateResponse,
    pub after_activate: Vec<GetStateResponse>,
    pub after_deactivate: Vec<GetStateResponse>,
}

/// Loads the trusted key from a PEM file, or falls back to the embedded one.
pub fn load_validator(public_key: Option<&Path>) -> Result<ActivationValidator> {
    let Some(path) = public_key else {
        return Ok(ActivationValidator::embedded());
    };
    let pem = fs::read_to_string(path)
        .with_context(|| format!("Failed to read public key file {}", path.display()))?;
    ActivationValidator::from_public_key_pem(&pem).context("Failed to decode public key")
}

/// Loads service configuration from a JSON file, or returns the defaults.
pub fn load_config(path: Option<&Path>) -> Result<EntitlementConfig> {
    let Some(path) = path else {
        return Ok(EntitlementConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse config file")
}

/// Starts `replicas` services on one in-memory store, activates through the
/// first, deactivates through the last, and snapshots every replica's state
/// after each step.
pub async fn simulate(
    validator: ActivationValidator,
    request: ActivateRequest,
    replicas: usize,
    config: EntitlementConfig,
) -> Result<SimulationReport> {
    if replicas == 0 {
        bail!("at least one replica is required");
    }

    let kv = Arc::new(MemoryKv::new());
    let services: Vec<EntitlementService> = (0..replicas)
        .map(|_| {
            EntitlementService::start(
                kv.clone(),
                validator.clone(),
                Arc::new(NoopPurger),
                config.clone(),
            )
        })
        .collect();
    info!(replicas, "replicas started");

    let result = run_steps(&services, request).await;
    for service in &services {
        service.shutdown().await;
    }
    result
}

async fn run_steps(
    services: &[EntitlementService],
    request: ActivateRequest,
) -> Result<SimulationReport> {
    let (first, last) = match (services.first(), services.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => bail!("at least one replica is required"),
    };

    let activated = first.activate(request).await.context("Activation failed")?;
    info!(expires = %activated.expires, "activated through replica 0");
    let after_activate = services.iter().map(EntitlementService::get_state).collect();

    last.deactivate().await.context("Deactivation failed")?;
    info!(replica = services.len() - 1, "deactivated");
    let after_deactivate = services.iter().map(EntitlementService::get_state).collect();

    Ok(SimulationReport {
        activated,
        after_activate,
        after_deactivate,
    })
}
