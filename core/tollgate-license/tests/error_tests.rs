use tollgate_license::LicenseError;

#[test]
fn error_display_malformed_artifact() {
    let err = LicenseError::MalformedArtifact("not base64".into());
    let msg = format!("{err}");
    assert!(msg.contains("malformed activation code"));
    assert!(msg.contains("not base64"));
}

#[test]
fn error_display_invalid_signature() {
    let err = LicenseError::InvalidSignature;
    assert!(format!("{err}").contains("signature"));
}

#[test]
fn error_display_malformed_payload() {
    let err = LicenseError::MalformedPayload("missing field".into());
    let msg = format!("{err}");
    assert!(msg.contains("malformed activation token"));
    assert!(msg.contains("missing field"));
}

#[test]
fn error_display_expired() {
    let err = LicenseError::ArtifactExpired("2025-01-01T00:00:00+00:00".into());
    let msg = format!("{err}");
    assert!(msg.contains("expired"));
    assert!(msg.contains("2025-01-01"));
}

#[test]
fn error_display_invalid_trust_key() {
    let err = LicenseError::InvalidTrustKey("bad pem".into());
    assert!(format!("{err}").contains("invalid trust key"));
}

#[test]
fn error_variants_are_distinguishable() {
    let errors = [
        LicenseError::MalformedArtifact(String::new()),
        LicenseError::InvalidSignature,
        LicenseError::MalformedPayload(String::new()),
        LicenseError::ArtifactExpired(String::new()),
        LicenseError::InvalidTrustKey(String::new()),
    ];
    for (i, a) in errors.iter().enumerate() {
        for (j, b) in errors.iter().enumerate() {
            assert_eq!(i == j, a == b);
        }
    }
}
