//! Error types for activation code verification.

use thiserror::Error;

/// Activation code verification errors.
///
/// Each step of verification fails with its own variant so callers can
/// tell a corrupted code from a forged or stale one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    /// The code is not base64, not JSON, or its signature field is not base64.
    #[error("malformed activation code: {0}")]
    MalformedArtifact(String),

    /// RSA signature verification failed.
    #[error("invalid signature in activation code")]
    InvalidSignature,

    /// The signed token is not valid JSON or carries an unparsable expiry.
    #[error("malformed activation token: {0}")]
    MalformedPayload(String),

    /// The code's expiry is not in the future.
    #[error("the activation code expired at {0}")]
    ArtifactExpired(String),

    /// The trust key could not be parsed into an RSA public key.
    #[error("invalid trust key: {0}")]
    InvalidTrustKey(String),
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
