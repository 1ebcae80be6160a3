//! Configuration for the session store.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::expired::ExpiredPolicy;

/// Default table name.
pub const DEFAULT_TABLE_NAME: &str = "sessions";

/// Default partition key attribute.
pub const DEFAULT_HASH_KEY: &str = "pk";

/// Default sort key attribute.
pub const DEFAULT_SORT_KEY: &str = "sk";

/// Default prefix prepended to session ids.
pub const DEFAULT_HASH_PREFIX: &str = "sess:";

/// Default session lifetime when neither a fixed TTL nor a cookie max-age applies (1 day).
pub const DEFAULT_TTL: Duration = Duration::from_millis(86_400_000);

/// Default minimum time between two touch writes (30 seconds).
pub const DEFAULT_TOUCH_INTERVAL: Duration = Duration::from_millis(30_000);

/// Configuration for the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Name of the table holding session records.
    pub table_name: String,

    /// Partition key attribute name.
    pub hash_key: String,

    /// Sort key attribute name. `None` addresses items by partition key only.
    pub sort_key: Option<String>,

    /// Prefix prepended to every session id to form the storage key.
    pub hash_prefix: String,

    /// Minimum time between two touch writes for the same session.
    pub touch_interval: Duration,

    /// Fixed session lifetime. Takes priority over the cookie max-age.
    pub ttl: Option<Duration>,

    /// Lifetime used when no TTL is configured and the cookie has no max-age.
    pub default_ttl: Duration,

    /// What a read does with a record past its expiry.
    pub expired_policy: ExpiredPolicy,

    /// Require the stored `updated` stamp to match the caller's on touch.
    pub optimistic_touch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            hash_key: DEFAULT_HASH_KEY.to_string(),
            sort_key: Some(DEFAULT_SORT_KEY.to_string()),
            hash_prefix: DEFAULT_HASH_PREFIX.to_string(),
            touch_interval: DEFAULT_TOUCH_INTERVAL,
            ttl: None,
            default_ttl: DEFAULT_TTL,
            expired_policy: ExpiredPolicy::default(),
            optimistic_touch: false,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    /// Set the partition key attribute name.
    pub fn with_hash_key(mut self, name: impl Into<String>) -> Self {
        self.hash_key = name.into();
        self
    }

    /// Set the sort key attribute name.
    pub fn with_sort_key(mut self, name: impl Into<String>) -> Self {
        self.sort_key = Some(name.into());
        self
    }

    /// Address items by partition key only.
    pub fn without_sort_key(mut self) -> Self {
        self.sort_key = None;
        self
    }

    /// Set the storage key prefix.
    pub fn with_hash_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hash_prefix = prefix.into();
        self
    }

    /// Set the touch interval.
    pub fn with_touch_interval(mut self, interval: Duration) -> Self {
        self.touch_interval = interval;
        self
    }

    /// Set a fixed TTL for every session.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Derive the TTL from the cookie (or the default).
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Set the fallback TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Keep expired records on read instead of deleting them.
    pub fn with_keep_expired(mut self, keep: bool) -> Self {
        self.expired_policy = ExpiredPolicy::from_keep_flag(keep);
        self
    }

    /// Enable or disable the optimistic `updated` check on touch.
    pub fn with_optimistic_touch(mut self, enabled: bool) -> Self {
        self.optimistic_touch = enabled;
        self
    }

    /// Check the key schema.
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(Error::Configuration("table name must not be empty".into()));
        }
        if self.hash_key.trim().is_empty() {
            return Err(Error::Configuration("hash key name must not be empty".into()));
        }
        if let Some(ref sort_key) = self.sort_key {
            if sort_key.trim().is_empty() {
                return Err(Error::Configuration("sort key name must not be empty".into()));
            }
            if *sort_key == self.hash_key {
                return Err(Error::Configuration(format!(
                    "sort key '{}' must differ from the hash key",
                    sort_key
                )));
            }
        }
        if self.default_ttl.is_zero() {
            return Err(Error::Configuration("default TTL must be positive".into()));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(Error::Configuration("TTL must be positive".into()));
        }
        Ok(())
    }
}
