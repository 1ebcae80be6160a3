//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [table]      # table identity and key schema
//! [session]    # TTL, touch interval, expired-record policy
//! [sqlite]     # local SQLite backend
//! ```

use std::path::PathBuf;
use std::time::Duration;

use kvsession_core::{
    DEFAULT_HASH_KEY, DEFAULT_HASH_PREFIX, DEFAULT_SORT_KEY, DEFAULT_TABLE_NAME,
    DEFAULT_TOUCH_INTERVAL, DEFAULT_TTL, StoreConfig,
};
use serde::{Deserialize, Serialize};

/// Default SQLite database filename within the data directory.
const DEFAULT_SQLITE_FILE: &str = "sessions.db";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvSessionConfig {
    /// Table identity and key schema.
    pub table: Option<TableConfig>,

    /// Session lifetime and touch policy.
    pub session: Option<SessionConfig>,

    /// SQLite backend settings.
    pub sqlite: Option<SqliteConfig>,
}

impl KvSessionConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: KvSessionConfig) {
        if other.table.is_some() {
            self.table = other.table;
        }

        if other.session.is_some() {
            self.session = other.session;
        }

        if other.sqlite.is_some() {
            self.sqlite = other.sqlite;
        }
    }

    /// Build and validate the session store configuration.
    pub fn store_config(&self) -> crate::Result<StoreConfig> {
        let table = self.table.clone().unwrap_or_default();
        let session = self.session.clone().unwrap_or_default();

        let config = StoreConfig {
            table_name: table.name_or_default(),
            hash_key: table.hash_key_or_default(),
            sort_key: table.effective_sort_key(),
            hash_prefix: table.hash_prefix_or_default(),
            touch_interval: session.touch_interval(),
            ttl: session.ttl(),
            default_ttl: session.default_ttl(),
            expired_policy: kvsession_core::ExpiredPolicy::from_keep_flag(
                session.keep_expired.unwrap_or(false),
            ),
            optimistic_touch: session.optimistic_touch.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    /// SQLite database path: configured, else the platform data directory.
    pub fn sqlite_path(&self) -> Option<PathBuf> {
        self.sqlite
            .as_ref()
            .and_then(|s| s.path.clone())
            .or_else(default_sqlite_path)
    }
}

/// Default SQLite location (`<data dir>/kvsession/sessions.db`).
pub fn default_sqlite_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("kvsession").join(DEFAULT_SQLITE_FILE))
}

// ─────────────────────────────────────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────────────────────────────────────

/// The `[table]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Table name.
    pub name: Option<String>,
    /// Partition key attribute.
    pub hash_key: Option<String>,
    /// Sort key attribute.
    pub sort_key: Option<String>,
    /// Set to `false` to address items by partition key only.
    pub use_sort_key: Option<bool>,
    /// Prefix prepended to session ids.
    pub hash_prefix: Option<String>,
}

impl TableConfig {
    fn name_or_default(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string())
    }

    fn hash_key_or_default(&self) -> String {
        self.hash_key
            .clone()
            .unwrap_or_else(|| DEFAULT_HASH_KEY.to_string())
    }

    fn hash_prefix_or_default(&self) -> String {
        self.hash_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_HASH_PREFIX.to_string())
    }

    /// The sort key in effect, `None` when disabled.
    pub fn effective_sort_key(&self) -> Option<String> {
        if self.use_sort_key == Some(false) {
            return None;
        }
        Some(
            self.sort_key
                .clone()
                .unwrap_or_else(|| DEFAULT_SORT_KEY.to_string()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// The `[session]` section. Durations are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Fixed lifetime for every session; overrides the cookie max-age.
    pub ttl_ms: Option<u64>,
    /// Lifetime when neither `ttl_ms` nor a cookie max-age applies.
    pub default_ttl_ms: Option<u64>,
    /// Minimum time between two touch writes.
    pub touch_interval_ms: Option<u64>,
    /// Keep expired records on read instead of deleting them.
    pub keep_expired: Option<bool>,
    /// Reject touches whose `updated` stamp no longer matches the record.
    pub optimistic_touch: Option<bool>,
}

impl SessionConfig {
    /// Configured fixed TTL.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// Fallback TTL.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TTL)
    }

    /// Touch debounce interval.
    pub fn touch_interval(&self) -> Duration {
        self.touch_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TOUCH_INTERVAL)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

/// The `[sqlite]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file path.
    pub path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
