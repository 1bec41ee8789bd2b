//! Activation code decoding and RSA signature verification.
//!
//! Codes are produced by the vendor's token tool, which runs on Node.js, so
//! the expiry string is whatever `Date.toJSON()` emits (RFC 3339 with
//! millisecond precision and a `Z` suffix).

use crate::error::{LicenseError, LicenseResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Embedded RSA public key (SPKI PEM, 4096 bits) that signs every
/// production code.
///
/// Rotating this key invalidates every previously issued activation code.
pub const EMBEDDED_PUBLIC_KEY_PEM: &str = "-----BEGIN PUBLIC KEY-----
MIICIjANBgkqhkiG9w0BAQEFAAOCAg8AMIICCgKCAgEAtJnDuD05fJZVsWDvN/un
m5xbG7jcmxUsSOQZfvMaafZjV6iG/z6Wst2uhcMGAMrLHBxFiRYiVVM3kbUhbfbw
3nVzALDLh4l/QzovCcF12FzVY8fB5Q6VQFfnup1aKimyJX7/au0ihvv//olQ1xrL
XRaG7h/hnCbmjLhsaGA6nqB4gtRI+HI3tBvQBicaN0P5pcfJlT49BSgJq6pnbZPY
SmXeL5m/o1sWZzjzlkmXuxxptG8WTDU3cYF2wmGNMDV/e7u7TuvnFLEz+xf8MUcq
LrDaDj1OuQVwftfz+jqZunQifx4pq6Sxk3ecQll2OhHE1LHrDdE+KSYumUVr0h5i
OVro2tqn4CUmwWrDb4O3TxowrNHylXWAWsLukXQCxguYPRRdIlpu8QPYvsdjU0xT
F7sRv8juuBMSOwRnEZE0M0E/XeLiJo9ROzVxHbRga2AHgDtt0rVHrUrlKmJFJyU2
DACvluEWcjXKXRJJkeieSQopITTQtBSYVu0fr1HG1pLOs1ZakPRPUi/xnSnDb2zK
XinORcb47IsWIHXtwHcwY1C7kV0IK3DxJrJZsSib171vAwi6q/HSOSkWxCURsOtK
x90hW9XbejJCpAiOYfPEOq0lT8fy1Ve0qBen1y4mcxtnXANrgQyYCCBftoc7Ctkk
m5MuBYYSa4PH/uIZktTYOkMCAwEAAQ==
-----END PUBLIC KEY-----
";

/// The outer envelope of an activation code.
///
/// Field names match the token tool's output. Changing them means reissuing
/// codes for every customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCode {
    /// The signed token, itself a JSON document.
    #[serde(rename = "Token", alias = "token")]
    pub token: String,
    /// Base64 RSASSA-PKCS1-v1_5 signature over `sha256(token)`.
    #[serde(rename = "Signature", alias = "signature")]
    pub signature: String,
}

/// The signed token carried inside an [`ActivationCode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationToken {
    /// Expiry as an RFC 3339 string.
    #[serde(rename = "Expiry", alias = "expiry")]
    pub expiry: String,
}

/// Verifies activation codes against a single trusted public key.
#[derive(Debug, Clone)]
pub struct ActivationValidator {
    public_key: RsaPublicKey,
    verifying_key: VerifyingKey<Sha256>,
}

impl ActivationValidator {
    /// Builds a validator around the embedded production key.
    ///
    /// # Panics
    ///
    /// Panics if the embedded key does not parse. That is a build defect,
    /// not a request error, and the service must not start with it.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_public_key_pem(EMBEDDED_PUBLIC_KEY_PEM)
            .expect("embedded activation public key is not a valid RSA SPKI PEM")
    }

    /// Builds a validator from an SPKI PEM encoded RSA public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidTrustKey`] if the PEM does not hold an
    /// RSA public key.
    pub fn from_public_key_pem(pem: &str) -> LicenseResult<Self> {
        let public_key = RsaPublicKey::from_public_key_pem(pem.trim())
            .map_err(|e| LicenseError::InvalidTrustKey(e.to_string()))?;
        Ok(Self::from_public_key(public_key))
    }

    /// Builds a validator from a DER encoded SPKI RSA public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::InvalidTrustKey`] if the bytes are not an
    /// SPKI RSA public key.
    pub fn from_public_key_der(der: &[u8]) -> LicenseResult<Self> {
        let public_key = RsaPublicKey::from_public_key_der(der)
            .map_err(|e| LicenseError::InvalidTrustKey(e.to_string()))?;
        Ok(Self::from_public_key(public_key))
    }

    /// Builds a validator from an already parsed key.
    /// Used for testing with a generated key pair.
    #[must_use]
    pub fn from_public_key(public_key: RsaPublicKey) -> Self {
        let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
        Self {
            public_key,
            verifying_key,
        }
    }

    /// Returns the trusted key.
    #[must_use]
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// Validates an activation code against the current wall clock and
    /// returns the expiry it authorizes.
    ///
    /// # Errors
    ///
    /// See [`ActivationValidator::validate_at`].
    pub fn validate(&self, code: &str) -> LicenseResult<DateTime<Utc>> {
        self.validate_at(code, Utc::now())
    }

    /// Validates an activation code as of `now`.
    ///
    /// # Errors
    ///
    /// - [`LicenseError::MalformedArtifact`] if the envelope does not decode
    /// - [`LicenseError::InvalidSignature`] if the signature does not verify
    /// - [`LicenseError::MalformedPayload`] if the token has no usable expiry
    /// - [`LicenseError::ArtifactExpired`] if the expiry is not after `now`
    pub fn validate_at(&self, code: &str, now: DateTime<Utc>) -> LicenseResult<DateTime<Utc>> {
        let envelope = decode_envelope(code)?;

        let sig_bytes = STANDARD.decode(envelope.signature.trim()).map_err(|e| {
            LicenseError::MalformedArtifact(format!("signature is not base64 encoded: {e}"))
        })?;
        let signature = Signature::try_from(sig_bytes.as_slice())
            .map_err(|_| LicenseError::InvalidSignature)?;

        // PKCS#1 v1.5 with SHA-256: the key hashes the token itself.
        self.verifying_key
            .verify(envelope.token.as_bytes(), &signature)
            .map_err(|_| LicenseError::InvalidSignature)?;

        let token: ActivationToken = serde_json::from_str(&envelope.token)
            .map_err(|e| LicenseError::MalformedPayload(format!("token is not valid JSON: {e}")))?;

        let expiry = DateTime::parse_from_rfc3339(token.expiry.trim())
            .map_err(|e| {
                LicenseError::MalformedPayload(format!(
                    "expiry {:?} is not an RFC 3339 timestamp: {e}",
                    token.expiry
                ))
            })?
            .with_timezone(&Utc);

        if expiry <= now {
            return Err(LicenseError::ArtifactExpired(expiry.to_rfc3339()));
        }
        Ok(expiry)
    }
}

fn decode_envelope(code: &str) -> LicenseResult<ActivationCode> {
    let raw = STANDARD.decode(code.trim()).map_err(|e| {
        LicenseError::MalformedArtifact(format!("activation code is not base64 encoded: {e}"))
    })?;
    serde_json::from_slice(&raw).map_err(|e| {
        LicenseError::MalformedArtifact(format!("activation code is not valid JSON: {e}"))
    })
}
