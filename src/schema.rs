//! Database schema definitions and migration logic.
//!
//! The persisted schema version lives in SQLite's `PRAGMA user_version`
//! slot, not in a table. Migrations are strictly forward and run in order;
//! each one is a batch of `IF NOT EXISTS` DDL, so a crash between applying
//! the DDL and persisting the version is safe to retry on the next open.

use crate::error::{Result, StoreError};
use rusqlite::Connection;

/// Latest schema version known to this build.
pub const LATEST_SCHEMA_VERSION: i32 = 2;

/// Migration 1: the core tables.
const MIGRATION_1_SQL: &str = r"
    -- Tasks
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        query TEXT NOT NULL,
        persona_id TEXT,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
    CREATE INDEX IF NOT EXISTS idx_tasks_persona_id ON tasks(persona_id);

    -- Issues
    CREATE TABLE IF NOT EXISTS issues (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT,
        context TEXT,
        status TEXT NOT NULL DEFAULT 'open',
        priority INTEGER NOT NULL DEFAULT 2,
        issue_type TEXT NOT NULL DEFAULT 'task',
        result TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_issues_task_id ON issues(task_id);
    CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);

    -- Dependencies between issues
    CREATE TABLE IF NOT EXISTS dependencies (
        id TEXT PRIMARY KEY,
        from_issue_id TEXT NOT NULL,
        to_issue_id TEXT NOT NULL,
        type TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (from_issue_id) REFERENCES issues(id) ON DELETE CASCADE,
        FOREIGN KEY (to_issue_id) REFERENCES issues(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_dependencies_from_issue_id ON dependencies(from_issue_id);
    CREATE INDEX IF NOT EXISTS idx_dependencies_to_issue_id ON dependencies(to_issue_id);

    -- Events (append-only audit trail)
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        payload TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_events_issue_id ON events(issue_id);

    -- Artifacts
    CREATE TABLE IF NOT EXISTS artifacts (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL,
        filename TEXT NOT NULL,
        content TEXT NOT NULL,
        content_type TEXT NOT NULL,
        is_final_result INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_artifacts_task_id ON artifacts(task_id);
";

/// Migration 2: conversation turns.
const MIGRATION_2_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS conversation_turns (
        id TEXT PRIMARY KEY,
        issue_id TEXT NOT NULL,
        turn_order INTEGER NOT NULL,
        role TEXT NOT NULL,
        content TEXT,
        thinking TEXT,
        tool_calls TEXT,
        tool_results TEXT,
        tool_call_id TEXT,
        created_at TEXT NOT NULL,
        FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_conversation_turns_issue_order
        ON conversation_turns(issue_id, turn_order);
";

/// DDL for the migration that brings a store *to* `version`.
///
/// Version N+1's DDL assumes version N's schema is in place; the batches
/// are never reordered or skipped.
fn migration_sql(version: i32) -> Option<&'static str> {
    match version {
        1 => Some(MIGRATION_1_SQL),
        2 => Some(MIGRATION_2_SQL),
        _ => None,
    }
}

/// Read the persisted schema version.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Bring the schema up to [`LATEST_SCHEMA_VERSION`].
///
/// Applies each pending migration in order, persisting the new version
/// number before the step is considered complete. Returns the resulting
/// version.
///
/// # Errors
///
/// Returns [`StoreError::MigrationFailed`] if a migration's DDL or its
/// version write fails; the persisted version stays at the last completed
/// step.
pub fn migrate_to_latest(conn: &Connection) -> Result<i32> {
    let mut version = schema_version(conn)?;
    while version < LATEST_SCHEMA_VERSION {
        let next = version + 1;
        let Some(sql) = migration_sql(next) else {
            break;
        };
        conn.execute_batch(sql)
            .map_err(|source| StoreError::MigrationFailed {
                version: next,
                source,
            })?;
        conn.pragma_update(None, "user_version", next)
            .map_err(|source| StoreError::MigrationFailed {
                version: next,
                source,
            })?;
        tracing::debug!(from = version, to = next, "applied schema migration");
        version = next;
    }
    Ok(version)
}
