//! Error types for the work store.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - One closed enum; every public operation returns [`Result`]
//! - Variants map one-to-one onto the failure points of the store:
//!   connection lifecycle, statement compilation/execution, schema
//!   migration, legacy recovery, and the serial queue itself

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for work store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An operation was invoked while no connection is live.
    #[error("store is not open")]
    NotOpen,

    /// The database connection could not be established. Covers both
    /// filesystem failures (missing directory, permissions) and engine
    /// failures; `message` carries the underlying diagnostic.
    #[error("could not open store at '{path}': {message}")]
    OpenFailed { path: PathBuf, message: String },

    /// A statement failed to compile.
    #[error("statement failed to prepare: {source}")]
    PrepareFailed {
        #[source]
        source: rusqlite::Error,
    },

    /// A statement failed during bind or execution.
    #[error("statement failed to execute: {source}")]
    ExecuteFailed {
        #[source]
        source: rusqlite::Error,
    },

    /// A schema migration's DDL failed. The persisted schema version is
    /// still the pre-migration value; the next open retries the step.
    #[error("migration to schema version {version} failed: {source}")]
    MigrationFailed {
        version: i32,
        #[source]
        source: rusqlite::Error,
    },

    /// Legacy recovery could not replace the current store file.
    #[error("legacy store recovery failed: {source}")]
    RecoveryFailed {
        #[source]
        source: std::io::Error,
    },

    /// A store operation was invoked from inside another store operation
    /// (e.g. from an `in_transaction` closure). Detected and rejected
    /// rather than deadlocking the serial queue.
    #[error("re-entrant store call detected; operations must not be nested")]
    Reentrant,

    /// The worker thread backing the store is gone.
    #[error("store worker is no longer running")]
    QueueClosed,

    /// File system I/O error outside the recovery path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub(crate) fn open_failed(path: &std::path::Path, message: impl ToString) -> Self {
        Self::OpenFailed {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Result type using [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
