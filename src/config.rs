//! Store configuration.
//!
//! The store never decides where its files live: callers resolve the
//! database path and the legacy fallback path and hand both over in a
//! [`StoreConfig`]. One config builds one [`WorkStore`](crate::WorkStore),
//! which is the single store handle for the process.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Paths and connection settings for one store deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Location of the store file. The parent directory is created on open.
    pub database_path: PathBuf,
    /// Location of the legacy store file checked by startup recovery.
    pub legacy_database_path: PathBuf,
    /// Busy timeout applied to the connection, in milliseconds.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
}

impl StoreConfig {
    #[must_use]
    pub fn new(
        database_path: impl Into<PathBuf>,
        legacy_database_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            database_path: database_path.into(),
            legacy_database_path: legacy_database_path.into(),
            lock_timeout_ms: None,
        }
    }

    /// Set the busy timeout handed to the connection on open.
    #[must_use]
    pub fn with_lock_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = Some(timeout_ms);
        self
    }
}
