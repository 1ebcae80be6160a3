//! Debouncing of expiry refresh writes.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::session::SessionData;

/// Decides whether a touch needs to reach the backend.
///
/// A session is refreshed at most once per interval; touches in between are
/// answered without a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchDebouncer {
    interval_ms: i64,
}

impl TouchDebouncer {
    /// Create a debouncer with the given interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: i64::try_from(interval.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// True when the session was never stamped or its stamp is at least one interval old.
    pub fn should_touch(&self, session: &SessionData, now: DateTime<Utc>) -> bool {
        match session.updated() {
            None => true,
            Some(updated) => updated.saturating_add(self.interval_ms) <= now.timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn debouncer() -> TouchDebouncer {
        TouchDebouncer::new(Duration::from_millis(30_000))
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(NOW_MS).unwrap()
    }

    #[test]
    fn test_unstamped_session_is_touched() {
        assert!(debouncer().should_touch(&SessionData::new(), now()));
    }

    #[test]
    fn test_recent_update_is_skipped() {
        let session = SessionData::new().with_updated(NOW_MS - 10_000);
        assert!(!debouncer().should_touch(&session, now()));
    }

    #[test]
    fn test_stale_update_is_touched() {
        let session = SessionData::new().with_updated(NOW_MS - 40_000);
        assert!(debouncer().should_touch(&session, now()));
    }

    #[test]
    fn test_exact_interval_boundary_is_touched() {
        let session = SessionData::new().with_updated(NOW_MS - 30_000);
        assert!(debouncer().should_touch(&session, now()));

        let session = SessionData::new().with_updated(NOW_MS - 29_999);
        assert!(!debouncer().should_touch(&session, now()));
    }

    #[test]
    fn test_zero_interval_always_touches() {
        let debouncer = TouchDebouncer::new(Duration::ZERO);
        let session = SessionData::new().with_updated(NOW_MS);
        assert!(debouncer.should_touch(&session, now()));
    }

    #[test]
    fn test_future_stamp_is_skipped() {
        let session = SessionData::new().with_updated(i64::MAX);
        assert!(!debouncer().should_touch(&session, now()));
    }
}
