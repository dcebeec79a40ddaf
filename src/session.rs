//! Statement execution against the live connection.
//!
//! A [`Session`] is handed to closures that already run inside the serial
//! queue; it is the only way statements touch the connection. Statement
//! handles are `rusqlite::Statement` values owned by the executing method,
//! so they are finalized on every exit path (success, bind failure, or
//! handler failure) when they drop.
//!
//! Binder helpers use SQLite's 1-based parameter indexes; reader helpers
//! use rusqlite's 0-based column indexes.

use crate::error::{Result, StoreError};
use crate::time::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Statement};

/// Executor over the single live connection, scoped to one queued
/// operation.
pub struct Session<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Session<'conn> {
    pub(crate) const fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Run one or more statements that take no parameters and produce no
    /// result rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ExecuteFailed`] with the engine's diagnostic
    /// on non-success.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn
            .execute_batch(sql)
            .map_err(|source| StoreError::ExecuteFailed { source })
    }

    /// Prepare `sql` and hand the raw statement (unbound, unstepped) to
    /// `handler` exactly once. The statement is finalized regardless of
    /// the handler's outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PrepareFailed`] if the statement does not
    /// compile, otherwise whatever `handler` returns.
    pub fn execute_with<R>(
        &self,
        sql: &str,
        handler: impl FnOnce(&mut Statement<'_>) -> Result<R>,
    ) -> Result<R> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|source| StoreError::PrepareFailed { source })?;
        handler(&mut stmt)
    }

    /// Prepare `sql`, let `bind` attach parameters, then let `process`
    /// step and consume the results. The statement is finalized on every
    /// exit path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PrepareFailed`] if the statement does not
    /// compile, otherwise the first failure from `bind` or `process`.
    pub fn prepare_and_execute<R>(
        &self,
        sql: &str,
        bind: impl FnOnce(&mut Statement<'_>) -> Result<()>,
        process: impl FnOnce(&mut Statement<'_>) -> Result<R>,
    ) -> Result<R> {
        self.execute_with(sql, |stmt| {
            bind(stmt)?;
            process(stmt)
        })
    }

    /// Convenience for insert/update/delete: prepare, bind, step once.
    /// Returns `true` if the statement completed without producing a row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ExecuteFailed`] if the write fails (including
    /// constraint violations).
    pub fn execute_update(
        &self,
        sql: &str,
        bind: impl FnOnce(&mut Statement<'_>) -> Result<()>,
    ) -> Result<bool> {
        self.prepare_and_execute(sql, bind, |stmt| {
            let mut rows = stmt.raw_query();
            let produced_row = rows
                .next()
                .map_err(|source| StoreError::ExecuteFailed { source })?
                .is_some();
            Ok(!produced_row)
        })
    }
}

// ---------------------------------------------------------------------------
// Binder helpers (1-based parameter indexes)
// ---------------------------------------------------------------------------

/// Bind nullable text; `None` binds SQL NULL.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the parameter cannot be bound.
pub fn bind_text(stmt: &mut Statement<'_>, index: usize, value: Option<&str>) -> Result<()> {
    stmt.raw_bind_parameter(index, value)
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Bind an integer.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the parameter cannot be bound.
pub fn bind_integer(stmt: &mut Statement<'_>, index: usize, value: i64) -> Result<()> {
    stmt.raw_bind_parameter(index, value)
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Bind a boolean as 0/1.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the parameter cannot be bound.
pub fn bind_bool(stmt: &mut Statement<'_>, index: usize, value: bool) -> Result<()> {
    bind_integer(stmt, index, i64::from(value))
}

/// Bind a timestamp in the store's textual format.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the parameter cannot be bound.
pub fn bind_timestamp(stmt: &mut Statement<'_>, index: usize, value: DateTime<Utc>) -> Result<()> {
    stmt.raw_bind_parameter(index, format_timestamp(value))
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Bind a nullable JSON payload serialized to text.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the parameter cannot be bound.
pub fn bind_json(
    stmt: &mut Statement<'_>,
    index: usize,
    value: Option<&serde_json::Value>,
) -> Result<()> {
    stmt.raw_bind_parameter(index, value.map(serde_json::Value::to_string))
        .map_err(|source| StoreError::ExecuteFailed { source })
}

// ---------------------------------------------------------------------------
// Reader helpers (0-based column indexes)
// ---------------------------------------------------------------------------

fn conversion_failure(
    index: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> StoreError {
    StoreError::ExecuteFailed {
        source: rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)),
    }
}

/// Read nullable text.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the column cannot be read.
pub fn read_text(row: &Row<'_>, index: usize) -> Result<Option<String>> {
    row.get(index)
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Read an integer.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the column cannot be read.
pub fn read_integer(row: &Row<'_>, index: usize) -> Result<i64> {
    row.get(index)
        .map_err(|source| StoreError::ExecuteFailed { source })
}

/// Read a 0/1 integer column as a boolean.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the column cannot be read.
pub fn read_bool(row: &Row<'_>, index: usize) -> Result<bool> {
    Ok(read_integer(row, index)? != 0)
}

/// Read a timestamp stored in the store's textual format.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the column cannot be read or
/// does not hold a valid timestamp.
pub fn read_timestamp(row: &Row<'_>, index: usize) -> Result<DateTime<Utc>> {
    let raw: String = row
        .get(index)
        .map_err(|source| StoreError::ExecuteFailed { source })?;
    parse_timestamp(&raw).map_err(|err| conversion_failure(index, err))
}

/// Read a nullable JSON payload.
///
/// # Errors
///
/// Returns [`StoreError::ExecuteFailed`] if the column cannot be read or
/// does not hold valid JSON.
pub fn read_json(row: &Row<'_>, index: usize) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = row
        .get(index)
        .map_err(|source| StoreError::ExecuteFailed { source })?;
    raw.map(|text| serde_json::from_str(&text).map_err(|err| conversion_failure(index, err)))
        .transpose()
}
