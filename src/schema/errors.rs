//! Schema store errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for schema store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a schema store or one of its transactions.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{table}' not found for tenant '{tenant}'")]
    TableNotFound { tenant: String, table: String },

    #[error("column '{column}' not found on table '{table}'")]
    ColumnNotFound { table: String, column: String },

    #[error("column '{column}' already exists on table '{table}'")]
    ColumnExists { table: String, column: String },

    #[error("table '{table}' is keyed by '{existing}', not '{requested}'")]
    PrimaryKeyMismatch {
        table: String,
        existing: String,
        requested: String,
    },

    #[error("column '{column}' on table '{table}' cannot shrink from {current} to {requested}")]
    Shrink {
        table: String,
        column: String,
        current: u32,
        requested: u32,
    },

    /// Another transaction committed a change to the same table first
    #[error("table '{table}' was changed by a concurrent commit")]
    Conflict { table: String },

    #[error("schema catalog I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("schema catalog at {path} is malformed: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("schema store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Conflicts are the only store failures a caller may simply retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
