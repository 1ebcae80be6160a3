//! Handling of expired records found on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::SessionRecord;
use crate::expiry::to_epoch_seconds;

/// What a read does with a record that is past its expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiredPolicy {
    /// Delete the record, then report no session.
    #[default]
    Delete,
    /// Leave the record in place and report no session.
    Keep,
}

impl ExpiredPolicy {
    /// Map the `keep_expired` configuration flag.
    pub fn from_keep_flag(keep: bool) -> Self {
        if keep { Self::Keep } else { Self::Delete }
    }

    /// Whether expired records are kept.
    pub fn keeps(&self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Action to take for a record found past its expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiredAction {
    /// Report no session, leave storage untouched.
    ReturnNone,
    /// Delete the record, then report no session.
    DeleteThenReturnNone,
}

/// Applies the configured [`ExpiredPolicy`] to records read from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiredResolver {
    policy: ExpiredPolicy,
}

impl ExpiredResolver {
    /// Create a resolver for the given policy.
    pub fn new(policy: ExpiredPolicy) -> Self {
        Self { policy }
    }

    /// Action for an expired record. The choice depends only on the policy.
    pub fn resolve_expired(&self) -> ExpiredAction {
        match self.policy {
            ExpiredPolicy::Keep => ExpiredAction::ReturnNone,
            ExpiredPolicy::Delete => ExpiredAction::DeleteThenReturnNone,
        }
    }

    /// `None` while the record is live, otherwise the action to take.
    pub fn resolve(&self, record: &SessionRecord, now: DateTime<Utc>) -> Option<ExpiredAction> {
        is_expired(record.expires, now).then(|| self.resolve_expired())
    }
}

/// A record expires once its expiry second has been reached.
pub fn is_expired(expires_epoch_seconds: i64, now: DateTime<Utc>) -> bool {
    expires_epoch_seconds <= to_epoch_seconds(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::key::KeyBuilder;
    use serde_json::json;

    fn record(expires: i64) -> SessionRecord {
        let key = KeyBuilder::new(&StoreConfig::default()).item_key("abc");
        SessionRecord::new(key, expires, json!({}))
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn test_live_record_has_no_action() {
        let resolver = ExpiredResolver::new(ExpiredPolicy::Delete);
        assert_eq!(resolver.resolve(&record(1_001), at(1_000)), None);
    }

    #[test]
    fn test_expiry_boundary_is_expired() {
        assert!(is_expired(1_000, at(1_000)));
        assert!(!is_expired(1_001, at(1_000)));
        // Sub-second progress within the expiry second still counts
        let late = DateTime::from_timestamp_millis(999_999).unwrap();
        assert!(!is_expired(1_000, late));
    }

    #[test]
    fn test_delete_policy() {
        let resolver = ExpiredResolver::new(ExpiredPolicy::from_keep_flag(false));
        assert_eq!(
            resolver.resolve(&record(10), at(1_000)),
            Some(ExpiredAction::DeleteThenReturnNone)
        );
    }

    #[test]
    fn test_keep_policy_is_stable() {
        let resolver = ExpiredResolver::new(ExpiredPolicy::from_keep_flag(true));
        let expired = record(10);
        for _ in 0..3 {
            assert_eq!(
                resolver.resolve(&expired, at(1_000)),
                Some(ExpiredAction::ReturnNone)
            );
        }
    }
}
