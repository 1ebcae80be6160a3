//! Session payload as handed over by session middleware.
//!
//! The payload is an open JSON object kept exactly as given. Only two
//! fields are interpreted here: `updated` (epoch milliseconds of the last
//! write) and `cookie.maxAge` (milliseconds). Both are read leniently: a
//! value of the wrong shape reads as absent and is stored back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UPDATED: &str = "updated";
const COOKIE: &str = "cookie";
const MAX_AGE: &str = "maxAge";

/// Session data stored under a session id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData {
    fields: Map<String, Value>,
}

impl SessionData {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing JSON object.
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Decode a stored payload. Fails only when it is not a JSON object.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value).map(Self::from_map)
    }

    /// Encode for storage.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// The raw payload.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Set a top-level field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Epoch milliseconds of the last write, when stored as an integer.
    pub fn updated(&self) -> Option<i64> {
        updated_stamp(&self.fields)
    }

    /// Stamp the last-write time (epoch milliseconds).
    pub fn set_updated(&mut self, updated_ms: i64) {
        self.fields.insert(UPDATED.to_string(), Value::from(updated_ms));
    }

    /// Builder form of [`set_updated`](Self::set_updated).
    pub fn with_updated(mut self, updated_ms: i64) -> Self {
        self.set_updated(updated_ms);
        self
    }

    /// Set `cookie.maxAge`, keeping other cookie attributes.
    ///
    /// A `cookie` that is not an object is replaced.
    pub fn with_cookie_max_age(mut self, max_age_ms: u64) -> Self {
        let cookie = self
            .fields
            .entry(COOKIE)
            .or_insert_with(|| Value::Object(Map::new()));
        if !cookie.is_object() {
            *cookie = Value::Object(Map::new());
        }
        if let Value::Object(attrs) = cookie {
            attrs.insert(MAX_AGE.to_string(), Value::from(max_age_ms));
        }
        self
    }

    /// Cookie max-age in milliseconds, when present as a non-negative integer.
    pub fn cookie_max_age_ms(&self) -> Option<u64> {
        self.fields
            .get(COOKIE)
            .and_then(Value::as_object)
            .and_then(|cookie| cookie.get(MAX_AGE))
            .and_then(Value::as_u64)
    }
}

/// Read the `updated` stamp from a raw payload object.
pub(crate) fn updated_stamp(fields: &Map<String, Value>) -> Option<i64> {
    fields.get(UPDATED).and_then(Value::as_i64)
}
