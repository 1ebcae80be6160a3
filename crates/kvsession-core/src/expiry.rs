//! Session expiry computation.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::StoreConfig;
use crate::session::SessionData;

/// Computes when a session record expires.
///
/// Lifetime resolution order:
/// 1. the configured fixed TTL
/// 2. the session cookie's `maxAge`, if it is a non-negative integer
/// 3. the default TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpirationPolicy {
    ttl: Option<Duration>,
    default_ttl: Duration,
}

impl ExpirationPolicy {
    /// Create a policy from the store configuration.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            ttl: config.ttl,
            default_ttl: config.default_ttl,
        }
    }

    /// Lifetime granted to this session, in milliseconds.
    pub fn lifetime_ms(&self, session: &SessionData) -> u64 {
        match self.ttl {
            Some(ttl) => duration_ms(ttl),
            None => session
                .cookie_max_age_ms()
                .unwrap_or_else(|| duration_ms(self.default_ttl)),
        }
    }

    /// Absolute expiry for a session written at `now`.
    pub fn compute_expiry(&self, session: &SessionData, now: DateTime<Utc>) -> DateTime<Utc> {
        let lifetime = i64::try_from(self.lifetime_ms(session)).unwrap_or(i64::MAX);
        TimeDelta::try_milliseconds(lifetime)
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expiry as whole epoch seconds, the form stored on the record.
    pub fn compute_expiry_seconds(&self, session: &SessionData, now: DateTime<Utc>) -> i64 {
        to_epoch_seconds(self.compute_expiry(session, now))
    }
}

/// Whole epoch seconds of a timestamp, truncating sub-second precision.
pub fn to_epoch_seconds(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis() / 1000
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
