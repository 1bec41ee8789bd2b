//! Activation code verification for Tollgate.
//!
//! An activation code is issued offline by the vendor's signing tool and
//! proves that the holder may enable the cluster's entitlement until a given
//! expiry. Verification needs no network access: the trusted public key is
//! compiled into the binary.
//!
//! # Activation Code Format
//!
//! `base64(json)` where the JSON object is
//! `{"Token": "<payload json>", "Signature": "<base64 signature>"}`.
//!
//! The signature is RSASSA-PKCS1-v1_5 with SHA-256 over the `Token`
//! string, checked against a 4096-bit RSA key.
//! The token itself is `{"Expiry": "<RFC 3339 timestamp>"}`.

mod error;
mod validator;

pub use error::{LicenseError, LicenseResult};
pub use validator::{ActivationCode, ActivationToken, ActivationValidator, EMBEDDED_PUBLIC_KEY_PEM};
