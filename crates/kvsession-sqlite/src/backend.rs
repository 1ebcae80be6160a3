//! SQLite implementation of [`SessionBackend`].

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kvsession_core::{
    BackendError, ItemKey, SessionBackend, SessionRecord, StoreConfig, UpdateCondition,
    UpdateOutcome, UpdateRequest,
};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params, params_from_iter};
use tracing::{debug, info};

use crate::error::{Access, Result, SqliteError, to_backend};
use crate::schema::Schema;

/// Session backend backed by a SQLite table.
///
/// Each operation runs on the blocking thread pool against a single
/// connection. Uses WAL mode so readers in other processes are not blocked.
#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    schema: Arc<Schema>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open or create a database at `path` with a table for `config`'s key schema.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        let schema = Schema::from_config(config)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| SqliteError::CreateDir {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        let backend = Self::initialize(conn, schema)?;
        info!(path = %path.display(), table = %backend.schema.table(), "Session database opened");
        Ok(backend)
    }

    /// Create an in-memory database (useful for testing).
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let schema = Schema::from_config(config)?;
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, schema)
    }

    fn initialize(conn: Connection, schema: Schema) -> Result<Self> {
        schema.create(&conn)?;
        debug!(table = %schema.table(), "Session table ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schema: Arc::new(schema),
        })
    }

    /// Table layout in use.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Delete every row whose expiry is at or before `now_epoch_seconds`.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self, now_epoch_seconds: i64) -> Result<usize> {
        let removed = self
            .run(move |conn, schema| {
                conn.execute(&schema.purge_sql(), params![now_epoch_seconds])
                    .map_err(|e| to_backend(Access::Write, e))
            })
            .await?;

        if removed > 0 {
            info!(count = removed, "Purged expired sessions");
        }
        Ok(removed)
    }

    /// Number of stored sessions, expired ones included.
    pub async fn count(&self) -> Result<usize> {
        let count: i64 = self
            .run(|conn, schema| {
                conn.query_row(&schema.count_sql(), [], |row| row.get(0))
                    .map_err(|e| to_backend(Access::Read, e))
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn run<T, F>(&self, op: F) -> std::result::Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Schema) -> std::result::Result<T, BackendError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let schema = Arc::clone(&self.schema);

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            op(&conn, &schema)
        })
        .await
        .map_err(|e| BackendError::Unavailable(format!("Task join error: {e}")))?
    }
}

#[async_trait]
impl SessionBackend for SqliteBackend {
    async fn put_item(&self, record: SessionRecord) -> std::result::Result<(), BackendError> {
        let mut values = self.schema.key_params(&record.key, Access::Write)?;
        let sess = serde_json::to_string(&record.sess)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        values.push(SqlValue::Integer(record.expires));
        values.push(SqlValue::Text(sess));

        self.run(move |conn, schema| {
            conn.execute(&schema.put_sql(), params_from_iter(values))
                .map_err(|e| to_backend(Access::Write, e))?;
            Ok(())
        })
        .await
    }

    async fn get_item_consistent(
        &self,
        key: &ItemKey,
    ) -> std::result::Result<Option<SessionRecord>, BackendError> {
        let values = self.schema.key_params(key, Access::Read)?;

        let row: Option<(i64, String)> = self
            .run(move |conn, schema| {
                conn.query_row(&schema.get_sql(), params_from_iter(values), |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()
                .map_err(|e| to_backend(Access::Read, e))
            })
            .await?;

        let Some((expires, sess)) = row else {
            return Ok(None);
        };
        let sess = serde_json::from_str(&sess)
            .map_err(|e| BackendError::Serialization(format!("{}: {}", key, e)))?;
        Ok(Some(SessionRecord::new(key.clone(), expires, sess)))
    }

    async fn delete_item(&self, key: &ItemKey) -> std::result::Result<(), BackendError> {
        let values = self.schema.key_params(key, Access::Write)?;

        self.run(move |conn, schema| {
            conn.execute(&schema.delete_sql(), params_from_iter(values))
                .map_err(|e| to_backend(Access::Write, e))?;
            Ok(())
        })
        .await
    }

    async fn conditional_update_item(
        &self,
        key: &ItemKey,
        update: UpdateRequest,
        condition: Option<UpdateCondition>,
    ) -> std::result::Result<UpdateOutcome, BackendError> {
        let keys = self.schema.key_params(key, Access::Write)?;
        let item = key.to_string();

        self.run(move |conn, schema| {
            let lookup = keys.clone();
            let stamp = [SqlValue::Integer(update.expires), SqlValue::Integer(update.updated)];

            let (sql, values): (String, Vec<SqlValue>) = match condition {
                None => (schema.upsert_stamp_sql(), keys.into_iter().chain(stamp).collect()),
                Some(UpdateCondition::Exists) => {
                    (schema.update_sql(), stamp.into_iter().chain(keys).collect())
                }
                Some(UpdateCondition::UpdatedEquals(expected)) => {
                    let expected = expected.map_or(SqlValue::Null, SqlValue::Integer);
                    (
                        schema.update_if_stamp_sql(),
                        stamp
                            .into_iter()
                            .chain(keys)
                            .chain(std::iter::once(expected))
                            .collect(),
                    )
                }
            };

            let changed = conn
                .execute(&sql, params_from_iter(values))
                .map_err(|e| to_backend(Access::Write, e))?;

            if changed > 0 {
                return Ok(UpdateOutcome::Applied);
            }

            // Nothing changed: either the condition failed or the payload
            // is not an object and cannot take the stamp.
            let payload_type: Option<String> = conn
                .query_row(&schema.payload_type_sql(), params_from_iter(lookup), |row| {
                    row.get(0)
                })
                .optional()
                .map_err(|e| to_backend(Access::Write, e))?;

            let non_object = payload_type.is_some_and(|t| t != "object");
            let stamp_matches = !matches!(condition, Some(UpdateCondition::UpdatedEquals(Some(_))));
            if non_object && stamp_matches {
                return Err(BackendError::Write(format!(
                    "item '{}' has a non-object payload",
                    item
                )));
            }
            Ok(UpdateOutcome::ConditionFailed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvsession_core::KeyBuilder;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup(config: &StoreConfig) -> (SqliteBackend, KeyBuilder) {
        (
            SqliteBackend::open_in_memory(config).unwrap(),
            KeyBuilder::new(config),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");
        let record = SessionRecord::new(key.clone(), 1_000, json!({ "updated": 5, "n": [1] }));

        backend.put_item(record.clone()).await.unwrap();
        assert_eq!(backend.get_item_consistent(&key).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_put_replaces() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");

        backend
            .put_item(SessionRecord::new(key.clone(), 1, json!({ "a": 1 })))
            .await
            .unwrap();
        backend
            .put_item(SessionRecord::new(key.clone(), 2, json!({ "b": 2 })))
            .await
            .unwrap();

        let record = backend.get_item_consistent(&key).await.unwrap().unwrap();
        assert_eq!(record.expires, 2);
        assert_eq!(record.sess, json!({ "b": 2 }));
        assert_eq!(backend.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        backend.delete_item(&keys.item_key("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_exists_condition() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");
        let update = UpdateRequest {
            expires: 50,
            updated: 9,
        };

        let outcome = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::Exists))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::ConditionFailed);
        assert_eq!(backend.count().await.unwrap(), 0);

        backend
            .put_item(SessionRecord::new(key.clone(), 1, json!({ "updated": 1, "cart": "x" })))
            .await
            .unwrap();
        let outcome = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::Exists))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);

        let record = backend.get_item_consistent(&key).await.unwrap().unwrap();
        assert_eq!(record.expires, 50);
        assert_eq!(record.sess, json!({ "updated": 9, "cart": "x" }));
    }

    #[tokio::test]
    async fn test_update_stamp_condition() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");
        backend
            .put_item(SessionRecord::new(key.clone(), 1, json!({ "updated": 7 })))
            .await
            .unwrap();
        let update = UpdateRequest {
            expires: 50,
            updated: 9,
        };

        let stale = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::UpdatedEquals(Some(6))))
            .await
            .unwrap();
        assert_eq!(stale, UpdateOutcome::ConditionFailed);

        let unstamped = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::UpdatedEquals(None)))
            .await
            .unwrap();
        assert_eq!(unstamped, UpdateOutcome::ConditionFailed);

        let current = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::UpdatedEquals(Some(7))))
            .await
            .unwrap();
        assert_eq!(current, UpdateOutcome::Applied);
    }

    #[tokio::test]
    async fn test_unconditional_update_creates_row() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");

        let outcome = backend
            .conditional_update_item(
                &key,
                UpdateRequest {
                    expires: 50,
                    updated: 9,
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);

        let record = backend.get_item_consistent(&key).await.unwrap().unwrap();
        assert_eq!(record.sess, json!({ "updated": 9 }));
    }

    #[tokio::test]
    async fn test_hash_only_schema() {
        let config = StoreConfig::default().without_sort_key().with_hash_key("id");
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");

        backend
            .put_item(SessionRecord::new(key.clone(), 10, json!({})))
            .await
            .unwrap();
        assert!(backend.get_item_consistent(&key).await.unwrap().is_some());

        let outcome = backend
            .conditional_update_item(
                &key,
                UpdateRequest {
                    expires: 20,
                    updated: 1,
                },
                Some(UpdateCondition::UpdatedEquals(None)),
            )
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Applied);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        for (id, expires) in [("old", 100), ("edge", 200), ("new", 300)] {
            backend
                .put_item(SessionRecord::new(keys.item_key(id), expires, json!({})))
                .await
                .unwrap();
        }

        assert_eq!(backend.purge_expired(200).await.unwrap(), 2);
        assert_eq!(backend.count().await.unwrap(), 1);
        assert!(
            backend
                .get_item_consistent(&keys.item_key("new"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_wrong_table_rejected() {
        let config = StoreConfig::default();
        let (backend, _) = setup(&config);
        let foreign = KeyBuilder::new(&config.with_table_name("other")).item_key("abc");

        let err = backend.get_item_consistent(&foreign).await.unwrap_err();
        assert!(matches!(err, BackendError::Read(_)));

        let err = backend.delete_item(&foreign).await.unwrap_err();
        assert!(matches!(err, BackendError::Write(_)));
    }

    #[tokio::test]
    async fn test_update_of_non_object_payload_is_rejected() {
        let config = StoreConfig::default();
        let (backend, keys) = setup(&config);
        let key = keys.item_key("abc");
        let original = SessionRecord::new(key.clone(), 10, json!("str"));
        backend.put_item(original.clone()).await.unwrap();
        let update = UpdateRequest {
            expires: 99,
            updated: 5,
        };

        for condition in [
            None,
            Some(UpdateCondition::Exists),
            Some(UpdateCondition::UpdatedEquals(None)),
        ] {
            let err = backend
                .conditional_update_item(&key, update, condition)
                .await
                .unwrap_err();
            assert!(matches!(err, BackendError::Write(_)));
            assert_eq!(
                backend.get_item_consistent(&key).await.unwrap(),
                Some(original.clone())
            );
        }

        // A stamp that can't match is a plain condition failure
        let outcome = backend
            .conditional_update_item(&key, update, Some(UpdateCondition::UpdatedEquals(Some(1))))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::ConditionFailed);
    }

    #[tokio::test]
    async fn test_open_file_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let config = StoreConfig::default();
        let key = KeyBuilder::new(&config).item_key("abc");

        {
            let backend = SqliteBackend::open(&path, &config).unwrap();
            backend
                .put_item(SessionRecord::new(key.clone(), 10, json!({ "k": "v" })))
                .await
                .unwrap();
        }

        let backend = SqliteBackend::open(&path, &config).unwrap();
        let record = backend.get_item_consistent(&key).await.unwrap().unwrap();
        assert_eq!(record.sess, json!({ "k": "v" }));
    }
}
