//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored value could not be decoded into its domain type.
    #[error("Corrupt row in '{table}': {reason}")]
    Decode { table: &'static str, reason: String },

    /// A unique constraint rejected the write.
    #[error("Duplicate value for '{field}': {value}")]
    Duplicate { field: &'static str, value: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// Maps a SQLite unique-constraint violation onto [`DatabaseError::Duplicate`].
    pub(crate) fn from_insert(err: rusqlite::Error, field: &'static str, value: &str) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref code, _)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                DatabaseError::Duplicate {
                    field,
                    value: value.to_string(),
                }
            }
            other => DatabaseError::Sqlite(other),
        }
    }
}
