//! Shared test helpers for activation code tests.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

const TEST_SIGNING_KEY_PEM: &str = include_str!("../../../../testdata/activation_signing_key.pem");
const ROGUE_SIGNING_KEY_PEM: &str = include_str!("../../../../testdata/rogue_signing_key.pem");

/// Public half of the test key, as the CLI would read it from disk.
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../../../../testdata/activation_public_key.pem");

/// A code for `{"Expiry":"2999-01-01T00:00:00.000Z"}` signed with
/// `openssl dgst -sha256 -sign` using the test key.
pub const OPENSSL_SIGNED_CODE: &str = include_str!("../../../../testdata/activation_code_2999.txt");

fn load(pem: &str) -> (SigningKey<Sha256>, RsaPublicKey) {
    let private_key = RsaPrivateKey::from_pkcs8_pem(pem).unwrap();
    let public_key = RsaPublicKey::from(&private_key);
    (SigningKey::<Sha256>::new(private_key), public_key)
}

/// Returns the fixed 2048-bit RSA test key pair.
pub fn test_keypair() -> (SigningKey<Sha256>, RsaPublicKey) {
    load(TEST_SIGNING_KEY_PEM)
}

/// A key pair the test validator does not trust.
pub fn rogue_keypair() -> (SigningKey<Sha256>, RsaPublicKey) {
    load(ROGUE_SIGNING_KEY_PEM)
}

/// Formats a timestamp the way `Date.toJSON()` does.
pub fn to_json_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wraps an arbitrary token string into a signed activation code.
pub fn sign_token(signing_key: &SigningKey<Sha256>, token: &str) -> String {
    let signature = signing_key.sign(token.as_bytes());
    envelope(token, &STANDARD.encode(signature.to_bytes()))
}

/// Builds `base64({"Token":..,"Signature":..})` without signing anything.
pub fn envelope(token: &str, signature_b64: &str) -> String {
    let json = serde_json::json!({ "Token": token, "Signature": signature_b64 });
    STANDARD.encode(json.to_string())
}

/// Creates a signed activation code expiring at `expiry`.
pub fn make_code(signing_key: &SigningKey<Sha256>, expiry: DateTime<Utc>) -> String {
    let token = serde_json::json!({ "Expiry": to_json_date(expiry) }).to_string();
    sign_token(signing_key, &token)
}
