//! Error types for the SQLite backend.

use kvsession_core::BackendError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors raised while opening or maintaining the database.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// Database connection or operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Table or column name is not a plain SQL identifier.
    #[error("Invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*")]
    InvalidIdentifier(String),

    /// Key column collides with a reserved column.
    #[error("Column name '{0}' is reserved")]
    ReservedColumn(String),

    /// Failed to create the database directory.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Error reported through the backend interface.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type alias for SQLite backend maintenance.
pub type Result<T> = std::result::Result<T, SqliteError>;

/// Which side of the backend contract an error occurred on.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Access {
    Read,
    Write,
}

/// Map a rusqlite error onto the backend error kinds.
pub(crate) fn to_backend(access: Access, err: rusqlite::Error) -> BackendError {
    if let rusqlite::Error::SqliteFailure(ref ffi, _) = err
        && matches!(
            ffi.code,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
        )
    {
        return BackendError::Unavailable(err.to_string());
    }

    match access {
        Access::Read => BackendError::Read(err.to_string()),
        Access::Write => BackendError::Write(err.to_string()),
    }
}
