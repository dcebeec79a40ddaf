//! One-time startup recovery from a legacy store file.
//!
//! An earlier deployment bug could leave a freshly created, never
//! populated store at the current path while the user's real data stayed
//! behind at the legacy path. Recovery repairs that on open: if the legacy
//! file exists and the current store holds zero tasks, the current file is
//! replaced by a copy of the legacy file and re-migrated. A current store
//! with any task rows is never touched.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::schema;
use crate::store::open_connection;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which recovery branch fired during an open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    /// The legacy file replaced an empty current store.
    Recovered,
    /// No legacy file exists; nothing to recover.
    NoLegacyStore,
    /// The current store already holds tasks; never overwritten.
    StoreHasData,
}

/// Run the recovery check against a freshly migrated connection.
///
/// Returns the connection to keep using (the original, or a new one onto
/// the recovered file) together with the branch that fired.
///
/// # Errors
///
/// Returns [`StoreError::RecoveryFailed`] if the file swap fails, or the
/// open/migration error if the recovered file cannot be brought up.
pub(crate) fn run(
    conn: Connection,
    config: &StoreConfig,
) -> Result<(Connection, RecoveryOutcome)> {
    let legacy = &config.legacy_database_path;
    if !legacy.exists() {
        return Ok((conn, RecoveryOutcome::NoLegacyStore));
    }

    let task_count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))
        .map_err(|source| StoreError::ExecuteFailed { source })?;
    if task_count > 0 {
        tracing::debug!(
            task_count,
            legacy = %legacy.display(),
            "legacy store present but current store has data; leaving both untouched"
        );
        return Ok((conn, RecoveryOutcome::StoreHasData));
    }

    tracing::info!(
        legacy = %legacy.display(),
        current = %config.database_path.display(),
        "current store is empty; recovering from legacy store file"
    );

    // Close the connection before touching the file, then swap.
    drop(conn);
    replace_store_file(&config.database_path, legacy)?;

    let conn = open_connection(config)?;
    schema::migrate_to_latest(&conn)?;
    Ok((conn, RecoveryOutcome::Recovered))
}

fn replace_store_file(current: &Path, legacy: &Path) -> Result<()> {
    fs::remove_file(current).map_err(|source| StoreError::RecoveryFailed { source })?;
    for sidecar in sidecar_paths(current) {
        if sidecar.exists() {
            fs::remove_file(&sidecar).map_err(|source| StoreError::RecoveryFailed { source })?;
        }
    }
    fs::copy(legacy, current).map_err(|source| StoreError::RecoveryFailed { source })?;
    Ok(())
}

/// WAL sidecar files that must not survive the swap.
fn sidecar_paths(db_path: &Path) -> [PathBuf; 2] {
    let base = db_path.display();
    [
        PathBuf::from(format!("{base}-wal")),
        PathBuf::from(format!("{base}-shm")),
    ]
}
