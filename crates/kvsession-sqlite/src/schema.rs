//! Table layout and SQL generation.

use kvsession_core::{BackendError, ItemKey, StoreConfig};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;

use crate::error::{Access, Result, SqliteError};

/// Columns every session table has besides the key columns.
const RESERVED_COLUMNS: [&str; 2] = ["expires", "sess"];

/// Layout of a session table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    table: String,
    hash_col: String,
    sort_col: Option<String>,
}

impl Schema {
    /// Derive the layout from the store's key schema.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let table = identifier(&config.table_name)?;
        let hash_col = column(&config.hash_key)?;
        let sort_col = config.sort_key.as_deref().map(column).transpose()?;

        Ok(Self {
            table,
            hash_col,
            sort_col,
        })
    }

    /// Table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table and its expiry index if missing.
    pub(crate) fn create(&self, conn: &Connection) -> rusqlite::Result<()> {
        let (key_cols, pk) = match self.sort_col {
            Some(ref sort) => (
                format!("{} TEXT NOT NULL, {} TEXT NOT NULL", self.hash_col, sort),
                format!("{}, {}", self.hash_col, sort),
            ),
            None => (format!("{} TEXT NOT NULL", self.hash_col), self.hash_col.clone()),
        };

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {key_cols},
                expires INTEGER NOT NULL,
                sess TEXT NOT NULL,
                PRIMARY KEY ({pk})
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_expires
                ON {table}(expires);
            "#,
            table = self.table,
        ))
    }

    /// Positional values for the key columns, hash first.
    ///
    /// A key that doesn't fit this table is reported on the `access` side.
    pub(crate) fn key_params(
        &self,
        key: &ItemKey,
        access: Access,
    ) -> std::result::Result<Vec<SqlValue>, BackendError> {
        let reject = |msg: String| match access {
            Access::Read => BackendError::Read(msg),
            Access::Write => BackendError::Write(msg),
        };

        if key.table != self.table {
            return Err(reject(format!(
                "backend serves table '{}', not '{}'",
                self.table, key.table
            )));
        }

        let mut params = vec![SqlValue::Text(key.hash.value.clone())];
        match (&self.sort_col, &key.sort) {
            (Some(_), Some(sort)) => params.push(SqlValue::Text(sort.value.clone())),
            (None, None) => {}
            (Some(col), None) => {
                return Err(reject(format!(
                    "key for '{}' is missing sort key '{}'",
                    key.hash.value, col
                )));
            }
            (None, Some(sort)) => {
                return Err(reject(format!(
                    "table '{}' has no sort key, got '{}'",
                    self.table, sort.name
                )));
            }
        }
        Ok(params)
    }

    /// `WHERE` clause matching one item; key parameters start at `?{first}`.
    fn key_predicate(&self, first: usize) -> String {
        match self.sort_col {
            Some(ref sort) => format!(
                "{} = ?{} AND {} = ?{}",
                self.hash_col,
                first,
                sort,
                first + 1
            ),
            None => format!("{} = ?{}", self.hash_col, first),
        }
    }

    fn key_count(&self) -> usize {
        if self.sort_col.is_some() { 2 } else { 1 }
    }

    fn key_columns(&self) -> String {
        match self.sort_col {
            Some(ref sort) => format!("{}, {}", self.hash_col, sort),
            None => self.hash_col.clone(),
        }
    }

    /// Full-row upsert. Params: keys, expires, sess.
    pub(crate) fn put_sql(&self) -> String {
        let n = self.key_count();
        let placeholders: Vec<String> = (1..=n + 2).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT OR REPLACE INTO {} ({}, expires, sess) VALUES ({})",
            self.table,
            self.key_columns(),
            placeholders.join(", ")
        )
    }

    /// Point read. Params: keys.
    pub(crate) fn get_sql(&self) -> String {
        format!(
            "SELECT expires, sess FROM {} WHERE {}",
            self.table,
            self.key_predicate(1)
        )
    }

    /// Point delete. Params: keys.
    pub(crate) fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE {}", self.table, self.key_predicate(1))
    }

    /// Partial update of an existing row with an object payload.
    /// Params: expires, updated, keys.
    pub(crate) fn update_sql(&self) -> String {
        format!(
            "UPDATE {} SET expires = ?1, sess = json_set(sess, '$.updated', ?2) \
             WHERE {} AND json_type(sess) = 'object'",
            self.table,
            self.key_predicate(3)
        )
    }

    /// Partial update guarded on the stored stamp. Params: expires, updated, keys, expected.
    pub(crate) fn update_if_stamp_sql(&self) -> String {
        format!(
            "{} AND json_extract(sess, '$.updated') IS ?{}",
            self.update_sql(),
            3 + self.key_count()
        )
    }

    /// Unconditional partial update, creating the row if needed.
    /// Params: keys, expires, updated.
    pub(crate) fn upsert_stamp_sql(&self) -> String {
        let n = self.key_count();
        let key_placeholders: Vec<String> = (1..=n).map(|i| format!("?{}", i)).collect();
        format!(
            "INSERT INTO {table} ({cols}, expires, sess) VALUES ({keys}, ?{e}, json_object('updated', ?{u})) \
             ON CONFLICT({cols}) DO UPDATE SET expires = excluded.expires, \
             sess = json_set(sess, '$.updated', ?{u}) \
             WHERE json_type(sess) = 'object'",
            table = self.table,
            cols = self.key_columns(),
            keys = key_placeholders.join(", "),
            e = n + 1,
            u = n + 2,
        )
    }

    /// JSON type of a row's payload. Params: keys.
    pub(crate) fn payload_type_sql(&self) -> String {
        format!(
            "SELECT json_type(sess) FROM {} WHERE {}",
            self.table,
            self.key_predicate(1)
        )
    }

    /// Bulk delete of expired rows. Params: now (epoch seconds).
    pub(crate) fn purge_sql(&self) -> String {
        format!("DELETE FROM {} WHERE expires <= ?1", self.table)
    }

    /// Row count.
    pub(crate) fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table)
    }
}

fn identifier(name: &str) -> Result<String> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(name.to_string())
    } else {
        Err(SqliteError::InvalidIdentifier(name.to_string()))
    }
}

fn column(name: &str) -> Result<String> {
    let name = identifier(name)?;
    if RESERVED_COLUMNS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(&name))
    {
        return Err(SqliteError::ReservedColumn(name));
    }
    Ok(name)
}
