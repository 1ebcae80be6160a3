//! Key-value backend abstraction.
//!
//! The session store never talks to a database directly. It issues four
//! item-level operations against a [`SessionBackend`], which owns transport,
//! retries, timeouts and the table itself. Implementations must make each
//! single-item operation atomic; nothing else is assumed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::ItemKey;
use crate::session::updated_stamp;

/// Errors reported by a backend.
///
/// The store passes these through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A write (put, update, delete) failed.
    #[error("Backend write failed: {0}")]
    Write(String),

    /// A read failed.
    #[error("Backend read failed: {0}")]
    Read(String),

    /// The backend could not encode or decode a record.
    #[error("Backend serialization failed: {0}")]
    Serialization(String),
}

/// A session as stored in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Item address.
    pub key: ItemKey,
    /// Expiry in whole epoch seconds.
    pub expires: i64,
    /// Session payload (a JSON object with an `updated` field).
    pub sess: Value,
}

impl SessionRecord {
    /// Create a record.
    pub fn new(key: ItemKey, expires: i64, sess: Value) -> Self {
        Self { key, expires, sess }
    }

    /// The `updated` stamp inside the payload, if any.
    pub fn updated(&self) -> Option<i64> {
        self.sess.as_object().and_then(updated_stamp)
    }
}

/// Partial update applied by a touch: only expiry and `sess.updated` change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// New expiry in whole epoch seconds.
    pub expires: i64,
    /// New `sess.updated` stamp in epoch milliseconds.
    pub updated: i64,
}

/// Precondition for a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateCondition {
    /// The item must exist.
    Exists,
    /// The item must exist and its `sess.updated` must equal this value
    /// (`None` meaning the field is absent).
    UpdatedEquals(Option<i64>),
}

impl UpdateCondition {
    /// Evaluate the condition against the current item, if any.
    pub fn holds(&self, current: Option<&SessionRecord>) -> bool {
        match (self, current) {
            (_, None) => false,
            (UpdateCondition::Exists, Some(_)) => true,
            (UpdateCondition::UpdatedEquals(expected), Some(record)) => {
                record.updated() == *expected
            }
        }
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was written.
    Applied,
    /// The precondition did not hold; nothing was written.
    ConditionFailed,
}

/// Trait for key-value backends holding session records.
///
/// Implement this trait to put the session store on top of a table. The
/// store calls exactly one method per operation and never retries.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Write the full record, replacing any existing item with the same key.
    async fn put_item(&self, record: SessionRecord) -> Result<(), BackendError>;

    /// Read an item with strong consistency.
    ///
    /// A record written by a completed `put_item` must be visible here.
    /// Return `Ok(None)` if the item doesn't exist.
    async fn get_item_consistent(&self, key: &ItemKey)
    -> Result<Option<SessionRecord>, BackendError>;

    /// Delete an item. Deleting a missing item is not an error.
    async fn delete_item(&self, key: &ItemKey) -> Result<(), BackendError>;

    /// Apply a partial update if the condition holds.
    ///
    /// Without a condition an implementation may create the item; the
    /// store always passes one.
    async fn conditional_update_item(
        &self,
        key: &ItemKey,
        update: UpdateRequest,
        condition: Option<UpdateCondition>,
    ) -> Result<UpdateOutcome, BackendError>;
}

#[async_trait]
impl<B: SessionBackend + ?Sized> SessionBackend for std::sync::Arc<B> {
    async fn put_item(&self, record: SessionRecord) -> Result<(), BackendError> {
        (**self).put_item(record).await
    }

    async fn get_item_consistent(
        &self,
        key: &ItemKey,
    ) -> Result<Option<SessionRecord>, BackendError> {
        (**self).get_item_consistent(key).await
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<(), BackendError> {
        (**self).delete_item(key).await
    }

    async fn conditional_update_item(
        &self,
        key: &ItemKey,
        update: UpdateRequest,
        condition: Option<UpdateCondition>,
    ) -> Result<UpdateOutcome, BackendError> {
        (**self)
            .conditional_update_item(key, update, condition)
            .await
    }
}
