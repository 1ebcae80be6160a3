//! Session persistence over a key-value table.
//!
//! This crate provides the session lifecycle used by web session middleware:
//! - `set` / `get` / `destroy` / `touch` against any [`SessionBackend`]
//! - Expiry computed from a fixed TTL, the session cookie's `maxAge`, or a default
//! - Debounced touches so busy sessions are not rewritten on every request
//! - A keep-or-delete policy for expired records found on read
//!
//! # Example
//!
//! ```rust,ignore
//! use kvsession_core::{MemoryBackend, SessionData, SessionStore, StoreConfig};
//!
//! let config = StoreConfig::default()
//!     .with_hash_prefix("app:")
//!     .with_touch_interval(Duration::from_secs(60));
//!
//! let store = SessionStore::new(config, MemoryBackend::new())?;
//! store.set("abc123", SessionData::new()).await?;
//! let session = store.get("abc123").await?;
//! ```

mod backend;
mod clock;
mod config;
mod error;
mod expired;
mod expiry;
mod key;
mod memory;
mod session;
mod store;
mod touch;

pub use backend::{
    BackendError, SessionBackend, SessionRecord, UpdateCondition, UpdateOutcome, UpdateRequest,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_HASH_KEY, DEFAULT_HASH_PREFIX, DEFAULT_SORT_KEY, DEFAULT_TABLE_NAME,
    DEFAULT_TOUCH_INTERVAL, DEFAULT_TTL, StoreConfig,
};
pub use error::{Error, Result};
pub use expired::{ExpiredAction, ExpiredPolicy, ExpiredResolver, is_expired};
pub use expiry::{ExpirationPolicy, to_epoch_seconds};
pub use key::{ItemKey, KeyAttribute, KeyBuilder};
pub use memory::{BackendStats, MemoryBackend};
pub use session::SessionData;
pub use store::{SessionStore, TouchOutcome};
pub use touch::TouchDebouncer;
