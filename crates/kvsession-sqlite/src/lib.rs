//! SQLite backend for the kvsession session store.
//!
//! Stores one row per session in a table laid out after the store's key
//! schema: the hash (and optional sort) key become the primary key columns,
//! next to an `expires` column in epoch seconds and a `sess` JSON column.
//! Touches use `json_set` so only `expires` and `sess.updated` change.
//!
//! SQLite has no native TTL sweeper, so [`SqliteBackend::purge_expired`]
//! is provided for periodic cleanup.

mod backend;
mod error;
mod schema;

pub use backend::SqliteBackend;
pub use error::{Result, SqliteError};
pub use schema::Schema;
