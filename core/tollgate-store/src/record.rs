//! The persisted entitlement record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The cluster's single entitlement record.
///
/// A record whose `expires` is the Unix epoch means "no entitlement". Real
/// activations never produce it; it stands in for an absent record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementRecord {
    /// The activation code that authorized this record, verbatim.
    pub activation_code: String,
    /// When the entitlement lapses.
    pub expires: DateTime<Utc>,
}

impl EntitlementRecord {
    /// Creates a record for an activation.
    pub fn new(activation_code: impl Into<String>, expires: DateTime<Utc>) -> Self {
        Self {
            activation_code: activation_code.into(),
            expires,
        }
    }

    /// The "no entitlement" sentinel.
    #[must_use]
    pub fn none() -> Self {
        Self {
            activation_code: String::new(),
            expires: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Returns true if this is the sentinel.
    #[must_use]
    pub fn is_none(&self) -> bool {
        self.expires == DateTime::<Utc>::UNIX_EPOCH
    }
}

impl Default for EntitlementRecord {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_epoch() {
        let none = EntitlementRecord::none();
        assert!(none.is_none());
        assert_eq!(none.expires.timestamp(), 0);
        assert_eq!(EntitlementRecord::default(), none);
    }

    #[test]
    fn json_uses_camel_case() {
        let record = EntitlementRecord::new("code", DateTime::<Utc>::UNIX_EPOCH);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"activationCode\":\"code\""));
        assert!(json.contains("\"expires\""));
    }
}
