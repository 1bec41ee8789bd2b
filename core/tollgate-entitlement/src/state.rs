//! Entitlement state derived from the cached record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tollgate_store::EntitlementRecord;

/// The cluster's entitlement state.
///
/// Never stored: always computed from the record and the clock, so an
/// active record turns expired without any write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementState {
    /// No activation code has been applied.
    None,
    /// The entitlement is valid.
    Active,
    /// The entitlement lapsed.
    Expired,
}

impl EntitlementState {
    /// Computes the state of `record` at `now`. A record expiring exactly
    /// at `now` is already expired.
    #[must_use]
    pub fn derive(record: &EntitlementRecord, now: DateTime<Utc>) -> Self {
        if record.is_none() {
            Self::None
        } else if now >= record.expires {
            Self::Expired
        } else {
            Self::Active
        }
    }

    /// Returns true for [`EntitlementState::Active`].
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn record_expiring(at: DateTime<Utc>) -> EntitlementRecord {
        EntitlementRecord::new("code", at)
    }

    #[test]
    fn sentinel_is_none() {
        let state = EntitlementState::derive(&EntitlementRecord::none(), Utc::now());
        assert_eq!(state, EntitlementState::None);
    }

    #[test]
    fn boundary_is_expired() {
        let now = Utc::now();
        assert_eq!(
            EntitlementState::derive(&record_expiring(now), now),
            EntitlementState::Expired
        );
    }

    #[test]
    fn serde_uses_upper_case_names() {
        assert_eq!(serde_json::to_string(&EntitlementState::None).unwrap(), "\"NONE\"");
        assert_eq!(serde_json::to_string(&EntitlementState::Active).unwrap(), "\"ACTIVE\"");
        let parsed: EntitlementState = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(parsed, EntitlementState::Expired);
    }

    proptest! {
        #[test]
        fn future_expiry_is_active(offset_ms in 1i64..1_000_000_000) {
            let now = Utc::now();
            let record = record_expiring(now + Duration::milliseconds(offset_ms));
            prop_assert_eq!(EntitlementState::derive(&record, now), EntitlementState::Active);
        }

        #[test]
        fn past_expiry_is_expired(offset_ms in 0i64..1_000_000_000) {
            let now = Utc::now();
            let record = record_expiring(now - Duration::milliseconds(offset_ms));
            prop_assert_eq!(EntitlementState::derive(&record, now), EntitlementState::Expired);
        }
    }
}
