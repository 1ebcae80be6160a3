//! In-process backend.
//!
//! Holds records in a hash map. Useful for tests, for embedding the store in
//! a single process, and as a reference for backend semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::trace;

use crate::backend::{
    BackendError, SessionBackend, SessionRecord, UpdateCondition, UpdateOutcome, UpdateRequest,
};
use crate::key::ItemKey;

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// `put_item` calls.
    pub puts: usize,
    /// `get_item_consistent` calls.
    pub gets: usize,
    /// `delete_item` calls.
    pub deletes: usize,
    /// `conditional_update_item` calls.
    pub updates: usize,
}

#[derive(Debug, Default)]
struct MemoryInner {
    items: HashMap<ItemKey, SessionRecord>,
    stats: BackendStats,
    fail_next: Option<BackendError>,
    fail_next_write: Option<BackendError>,
}

/// Backend keeping records in memory.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an item without going through the store or counting the call.
    pub fn peek(&self, key: &ItemKey) -> Option<SessionRecord> {
        self.inner.read().items.get(key).cloned()
    }

    /// Insert an item directly, bypassing the store and the counters.
    pub fn insert_raw(&self, record: SessionRecord) {
        self.inner.write().items.insert(record.key.clone(), record);
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Operation counters so far.
    pub fn stats(&self) -> BackendStats {
        self.inner.read().stats
    }

    /// Make the next operation fail with `error`.
    pub fn fail_next(&self, error: BackendError) {
        self.inner.write().fail_next = Some(error);
    }

    /// Make the next write (put, delete, update) fail with `error`.
    pub fn fail_next_write(&self, error: BackendError) {
        self.inner.write().fail_next_write = Some(error);
    }

    fn take_failure(inner: &mut MemoryInner, write: bool) -> Result<(), BackendError> {
        let armed = if write && inner.fail_next_write.is_some() {
            inner.fail_next_write.take()
        } else {
            inner.fail_next.take()
        };
        match armed {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn put_item(&self, record: SessionRecord) -> Result<(), BackendError> {
        let mut inner = self.inner.write();
        inner.stats.puts += 1;
        Self::take_failure(&mut inner, true)?;

        trace!(key = %record.key, expires = record.expires, "put item");
        inner.items.insert(record.key.clone(), record);
        Ok(())
    }

    async fn get_item_consistent(
        &self,
        key: &ItemKey,
    ) -> Result<Option<SessionRecord>, BackendError> {
        let mut inner = self.inner.write();
        inner.stats.gets += 1;
        Self::take_failure(&mut inner, false)?;

        Ok(inner.items.get(key).cloned())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<(), BackendError> {
        let mut inner = self.inner.write();
        inner.stats.deletes += 1;
        Self::take_failure(&mut inner, true)?;

        if inner.items.remove(key).is_some() {
            trace!(key = %key, "deleted item");
        }
        Ok(())
    }

    async fn conditional_update_item(
        &self,
        key: &ItemKey,
        update: UpdateRequest,
        condition: Option<UpdateCondition>,
    ) -> Result<UpdateOutcome, BackendError> {
        let mut inner = self.inner.write();
        inner.stats.updates += 1;
        Self::take_failure(&mut inner, true)?;

        if let Some(condition) = condition
            && !condition.holds(inner.items.get(key))
        {
            trace!(key = %key, ?condition, "update condition failed");
            return Ok(UpdateOutcome::ConditionFailed);
        }

        // Reject before changing anything so a failed update leaves no trace
        if let Some(existing) = inner.items.get(key)
            && !existing.sess.is_object()
        {
            return Err(BackendError::Write(format!(
                "item '{}' has a non-object payload",
                key
            )));
        }

        let record = inner
            .items
            .entry(key.clone())
            .or_insert_with(|| SessionRecord::new(key.clone(), 0, Value::Object(Map::new())));

        record.expires = update.expires;
        if let Value::Object(ref mut map) = record.sess {
            map.insert("updated".to_string(), Value::from(update.updated));
        }

        Ok(UpdateOutcome::Applied)
    }
}
