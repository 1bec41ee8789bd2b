//! Request and response messages for the entitlement RPC surface.
//!
//! The transport that carries these is owned by the surrounding server; the
//! types only fix the shape and the JSON field names.

use crate::state::EntitlementState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Applies an activation code to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    /// The signed activation code.
    pub activation_code: String,
    /// Optional earlier expiry, for testing. Ignored if later than the code's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

impl ActivateRequest {
    /// Creates a request without an expiry override.
    pub fn new(activation_code: impl Into<String>) -> Self {
        Self {
            activation_code: activation_code.into(),
            expires: None,
        }
    }

    /// Caps the stored expiry at `expires`.
    #[must_use]
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }
}

/// Result of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    /// The expiry actually stored.
    pub expires: DateTime<Utc>,
}

/// The cluster's entitlement state as seen by this replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStateResponse {
    /// Derived state.
    pub state: EntitlementState,
    /// The activation code in effect. Absent when `state` is `NONE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_code: Option<String>,
    /// When the entitlement lapses. Absent when `state` is `NONE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
}

/// Result of a successful deactivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateResponse {}
