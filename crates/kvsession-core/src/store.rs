//! Session store over a key-value backend.

use std::sync::Arc;

use tracing::{Instrument, Span, debug, debug_span, trace};

use crate::backend::{SessionBackend, SessionRecord, UpdateCondition, UpdateOutcome, UpdateRequest};
use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::expired::{ExpiredAction, ExpiredResolver};
use crate::expiry::ExpirationPolicy;
use crate::key::{ItemKey, KeyBuilder};
use crate::session::SessionData;
use crate::touch::TouchDebouncer;

/// Result of a touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    /// The last update is recent enough; nothing was written.
    Skipped,
    /// Expiry and `updated` were rewritten.
    Refreshed {
        /// New expiry in whole epoch seconds.
        expires: i64,
        /// New `updated` stamp in epoch milliseconds.
        updated: i64,
    },
    /// The record is gone, or was rewritten since the caller read it.
    Missing,
}

impl TouchOutcome {
    /// Whether a write reached the backend.
    pub fn is_refreshed(&self) -> bool {
        matches!(self, TouchOutcome::Refreshed { .. })
    }
}

/// Session store for web session middleware.
///
/// Provides the four operations a session middleware expects:
/// - `set`: write the full session and recompute its expiry
/// - `get`: strongly consistent read that hides expired sessions
/// - `destroy`: idempotent delete
/// - `touch`: debounced partial update of expiry and `updated`
///
/// The store holds no locks and spawns no tasks; consistency comes from the
/// backend's per-item atomicity. Every operation runs inside the store's
/// tracing span, which callers can replace with [`SessionStore::with_span`].
pub struct SessionStore<B: SessionBackend, C: Clock = SystemClock> {
    config: Arc<StoreConfig>,
    keys: KeyBuilder,
    expiry: ExpirationPolicy,
    debouncer: TouchDebouncer,
    expired: ExpiredResolver,
    backend: Arc<B>,
    clock: Arc<C>,
    span: Span,
}

impl<B: SessionBackend> SessionStore<B, SystemClock> {
    /// Create a store on the system clock.
    ///
    /// Fails with [`Error::Configuration`] if the key schema is invalid.
    pub fn new(config: StoreConfig, backend: B) -> Result<Self> {
        Self::with_clock(config, backend, SystemClock)
    }
}

impl<B: SessionBackend, C: Clock> SessionStore<B, C> {
    /// Create a store with an explicit time source.
    pub fn with_clock(config: StoreConfig, backend: B, clock: C) -> Result<Self> {
        config.validate()?;

        let span = debug_span!("session_store", table = %config.table_name);
        debug!(
            table = %config.table_name,
            hash_key = %config.hash_key,
            sort_key = ?config.sort_key,
            hash_prefix = %config.hash_prefix,
            touch_interval_ms = config.touch_interval.as_millis() as u64,
            ttl_ms = ?config.ttl.map(|ttl| ttl.as_millis()),
            expired_policy = ?config.expired_policy,
            "Initializing session store"
        );

        Ok(Self {
            keys: KeyBuilder::new(&config),
            expiry: ExpirationPolicy::new(&config),
            debouncer: TouchDebouncer::new(config.touch_interval),
            expired: ExpiredResolver::new(config.expired_policy),
            config: Arc::new(config),
            backend: Arc::new(backend),
            clock: Arc::new(clock),
            span,
        })
    }

    /// Run operations inside `span` instead of the default `session_store` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Storage key for a session id.
    pub fn storage_key(&self, session_id: &str) -> String {
        self.keys.build_key(session_id)
    }

    /// Store a session, replacing any existing record.
    ///
    /// Stamps `updated` with the current time and recomputes the expiry.
    /// Returns the session as written.
    pub async fn set(&self, session_id: &str, session: SessionData) -> Result<SessionData> {
        self.set_inner(session_id, session)
            .instrument(self.span.clone())
            .await
    }

    /// Load a session.
    ///
    /// Returns `Ok(None)` when the session doesn't exist or has expired.
    pub async fn get(&self, session_id: &str) -> Result<Option<SessionData>> {
        self.get_inner(session_id)
            .instrument(self.span.clone())
            .await
    }

    /// Delete a session. Deleting a missing session succeeds.
    pub async fn destroy(&self, session_id: &str) -> Result<()> {
        self.destroy_inner(session_id)
            .instrument(self.span.clone())
            .await
    }

    /// Refresh a session's expiry without rewriting its payload.
    ///
    /// Skipped without a backend call if `session.updated` is within the
    /// touch interval.
    pub async fn touch(&self, session_id: &str, session: &SessionData) -> Result<TouchOutcome> {
        self.touch_inner(session_id, session)
            .instrument(self.span.clone())
            .await
    }

    async fn set_inner(&self, session_id: &str, mut session: SessionData) -> Result<SessionData> {
        let now = self.clock.now();
        let key = self.keys.item_key(session_id);
        let expires = self.expiry.compute_expiry_seconds(&session, now);

        session.set_updated(now.timestamp_millis());
        let sess = session.to_value();

        debug!(session_id = %session_id, key = %key, expires, "Saving session");
        self.backend
            .put_item(SessionRecord::new(key, expires, sess))
            .await
            .inspect_err(|e| debug!(session_id = %session_id, error = %e, "Error saving session"))?;

        Ok(session)
    }

    async fn get_inner(&self, session_id: &str) -> Result<Option<SessionData>> {
        let key = self.keys.item_key(session_id);

        let record = self
            .backend
            .get_item_consistent(&key)
            .await
            .inspect_err(|e| debug!(session_id = %session_id, error = %e, "Error getting session"))?;

        let Some(record) = record else {
            debug!(session_id = %session_id, "Session not found");
            return Ok(None);
        };

        match self.expired.resolve(&record, self.clock.now()) {
            None => {
                let session =
                    SessionData::from_value(record.sess).map_err(|e| malformed(&record.key, e))?;
                trace!(session_id = %session_id, expires = record.expires, "Session found");
                Ok(Some(session))
            }
            Some(ExpiredAction::ReturnNone) => {
                debug!(session_id = %session_id, expires = record.expires, "Session expired, keeping record");
                Ok(None)
            }
            Some(ExpiredAction::DeleteThenReturnNone) => {
                debug!(session_id = %session_id, expires = record.expires, "Session expired, deleting record");
                self.delete(session_id, &key).await?;
                Ok(None)
            }
        }
    }

    async fn destroy_inner(&self, session_id: &str) -> Result<()> {
        let key = self.keys.item_key(session_id);
        self.delete(session_id, &key).await
    }

    async fn touch_inner(&self, session_id: &str, session: &SessionData) -> Result<TouchOutcome> {
        let now = self.clock.now();

        if !self.debouncer.should_touch(session, now) {
            trace!(session_id = %session_id, updated = ?session.updated(), "Skipping touch");
            return Ok(TouchOutcome::Skipped);
        }

        let key = self.keys.item_key(session_id);
        let update = UpdateRequest {
            expires: self.expiry.compute_expiry_seconds(session, now),
            updated: now.timestamp_millis(),
        };
        let condition = if self.config.optimistic_touch {
            UpdateCondition::UpdatedEquals(session.updated())
        } else {
            UpdateCondition::Exists
        };

        debug!(session_id = %session_id, expires = update.expires, ?condition, "Touching session");
        let outcome = self
            .backend
            .conditional_update_item(&key, update, Some(condition))
            .await
            .inspect_err(|e| debug!(session_id = %session_id, error = %e, "Error touching session"))?;

        match outcome {
            UpdateOutcome::Applied => Ok(TouchOutcome::Refreshed {
                expires: update.expires,
                updated: update.updated,
            }),
            UpdateOutcome::ConditionFailed => {
                debug!(session_id = %session_id, "Touch condition failed, session missing or rewritten");
                Ok(TouchOutcome::Missing)
            }
        }
    }

    async fn delete(&self, session_id: &str, key: &ItemKey) -> Result<()> {
        self.backend
            .delete_item(key)
            .await
            .inspect_err(|e| debug!(session_id = %session_id, error = %e, "Error destroying session"))?;
        debug!(session_id = %session_id, "Destroyed session");
        Ok(())
    }
}

impl<B: SessionBackend, C: Clock> Clone for SessionStore<B, C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            keys: self.keys.clone(),
            expiry: self.expiry,
            debouncer: self.debouncer,
            expired: self.expired,
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            span: self.span.clone(),
        }
    }
}

impl<B: SessionBackend, C: Clock> std::fmt::Debug for SessionStore<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn malformed(key: &ItemKey, err: serde_json::Error) -> Error {
    Error::MalformedSession {
        key: key.id().to_string(),
        reason: err.to_string(),
    }
}
