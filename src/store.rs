//! The store handle and connection lifecycle.
//!
//! [`WorkStore`] is the public surface: a cheaply cloneable handle whose
//! operations are all marshaled onto the serial queue. The worker-side
//! [`StoreState`] owns the one live connection; it is never reachable from
//! outside a queued operation.

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::queue::SerialQueue;
use crate::recovery::{self, RecoveryOutcome};
use crate::schema;
use crate::session::Session;
use rusqlite::{Connection, Statement, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

/// What a [`WorkStore::open`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReport {
    /// Schema version after migration (and recovery, if it ran).
    pub schema_version: i32,
    /// Which legacy-recovery branch fired.
    pub recovery: RecoveryOutcome,
}

/// Worker-side state: the configuration and the single live connection.
pub(crate) struct StoreState {
    config: StoreConfig,
    conn: Option<Connection>,
    last_open: Option<OpenReport>,
}

impl StoreState {
    fn session(&self) -> Result<Session<'_>> {
        self.conn
            .as_ref()
            .map(Session::new)
            .ok_or(StoreError::NotOpen)
    }

    fn open(&mut self) -> Result<OpenReport> {
        if self.conn.is_some() {
            if let Some(report) = self.last_open {
                return Ok(report);
            }
        }

        if let Some(parent) = self.config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| StoreError::open_failed(&self.config.database_path, err))?;
            }
        }

        let conn = open_connection(&self.config)?;
        schema::migrate_to_latest(&conn)?;
        let (conn, outcome) = recovery::run(conn, &self.config)?;
        let version = schema::schema_version(&conn)?;

        let report = OpenReport {
            schema_version: version,
            recovery: outcome,
        };
        tracing::info!(
            path = %self.config.database_path.display(),
            schema_version = version,
            recovery = ?outcome,
            "store opened"
        );
        self.conn = Some(conn);
        self.last_open = Some(report);
        Ok(report)
    }

    fn close(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!(path = %self.config.database_path.display(), "store closed");
        }
        self.last_open = None;
    }

    fn in_transaction<R>(&mut self, work: impl FnOnce(&Session<'_>) -> Result<R>) -> Result<R> {
        let conn = self.conn.as_mut().ok_or(StoreError::NotOpen)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|source| StoreError::ExecuteFailed { source })?;
        match work(&Session::new(&tx)) {
            Ok(value) => {
                tx.commit()
                    .map_err(|source| StoreError::ExecuteFailed { source })?;
                Ok(value)
            }
            Err(work_err) => {
                // Suppress the rollback failure: the causal error is the
                // one callers need. Keep the diagnostic visible.
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!(
                        error = %rollback_err,
                        "rollback after failed transaction also failed"
                    );
                }
                Err(work_err)
            }
        }
    }
}

/// Open the store file and apply connection-level settings.
pub(crate) fn open_connection(config: &StoreConfig) -> Result<Connection> {
    let path = &config.database_path;
    let conn =
        Connection::open(path).map_err(|err| StoreError::open_failed(path, err))?;
    if let Some(timeout) = config.lock_timeout_ms {
        conn.busy_timeout(Duration::from_millis(timeout))
            .map_err(|err| StoreError::open_failed(path, err))?;
    }
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|err| StoreError::open_failed(path, err))?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|err| StoreError::open_failed(path, err))?;
    Ok(conn)
}

/// Handle to the embedded work store.
///
/// One `WorkStore` is constructed per process from a [`StoreConfig`] and
/// passed (cloned) to every collaborator. All operations run one at a
/// time on a dedicated worker thread and are synchronous for the caller.
///
/// Operations must not be nested: calling any `WorkStore` method from
/// inside an [`in_transaction`](Self::in_transaction) or
/// [`execute`](Self::execute) closure fails with
/// [`StoreError::Reentrant`].
#[derive(Clone)]
pub struct WorkStore {
    queue: Arc<SerialQueue>,
}

impl WorkStore {
    /// Create the store handle. The database is not touched until
    /// [`open`](Self::open) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be started.
    pub fn new(config: StoreConfig) -> Result<Self> {
        let state = StoreState {
            config,
            conn: None,
            last_open: None,
        };
        Ok(Self {
            queue: Arc::new(SerialQueue::spawn(state)?),
        })
    }

    /// Open the store: connect, enforce foreign keys, migrate, then run
    /// legacy recovery. Idempotent; a second call on a live store returns
    /// the cached report with no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OpenFailed`], [`StoreError::MigrationFailed`]
    /// or [`StoreError::RecoveryFailed`] from the failing sub-step; the
    /// store is left closed.
    pub fn open(&self) -> Result<OpenReport> {
        self.queue.run(StoreState::open)
    }

    /// Release the connection. Idempotent; safe to call when not open.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the worker is gone.
    pub fn close(&self) -> Result<()> {
        self.queue.run(|state| {
            state.close();
            Ok(())
        })
    }

    /// Whether a connection is currently live.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::QueueClosed`] if the worker is gone.
    pub fn is_open(&self) -> Result<bool> {
        self.queue.run(|state| Ok(state.conn.is_some()))
    }

    /// Run an arbitrary unit of work against a [`Session`] inside the
    /// serial context. No transaction is opened; multi-statement units
    /// that must be atomic belong in [`in_transaction`](Self::in_transaction).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, otherwise
    /// whatever `op` returns.
    pub fn execute<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&Session<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.queue.run(move |state| op(&state.session()?))
    }

    /// Run a statement with no parameters and no result rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or
    /// [`StoreError::ExecuteFailed`] on engine failure.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.execute(move |session| session.execute_raw(&sql))
    }

    /// Prepare a statement and hand it, unbound and unstepped, to
    /// `handler`. See [`Session::execute_with`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live,
    /// [`StoreError::PrepareFailed`] if the statement does not compile,
    /// otherwise whatever `handler` returns.
    pub fn execute_with<R, F>(&self, sql: &str, handler: F) -> Result<R>
    where
        F: FnOnce(&mut Statement<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let sql = sql.to_string();
        self.execute(move |session| session.execute_with(&sql, handler))
    }

    /// Prepare, bind, and process a statement. See
    /// [`Session::prepare_and_execute`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or the
    /// first failure from prepare, `bind`, or `process`.
    pub fn prepare_and_execute<R, B, P>(&self, sql: &str, bind: B, process: P) -> Result<R>
    where
        B: FnOnce(&mut Statement<'_>) -> Result<()> + Send + 'static,
        P: FnOnce(&mut Statement<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let sql = sql.to_string();
        self.execute(move |session| session.prepare_and_execute(&sql, bind, process))
    }

    /// Insert/update/delete convenience. Returns `true` if the statement
    /// completed without producing a row. See [`Session::execute_update`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or
    /// [`StoreError::ExecuteFailed`] if the write fails.
    pub fn execute_update<B>(&self, sql: &str, bind: B) -> Result<bool>
    where
        B: FnOnce(&mut Statement<'_>) -> Result<()> + Send + 'static,
    {
        let sql = sql.to_string();
        self.execute(move |session| session.execute_update(&sql, bind))
    }

    /// Start a deferred unit of work with `BEGIN IMMEDIATE`.
    ///
    /// Prefer [`in_transaction`](Self::in_transaction); the explicit form
    /// leaves commit/rollback to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or
    /// [`StoreError::ExecuteFailed`] (e.g. a transaction is already
    /// active).
    pub fn begin_transaction(&self) -> Result<()> {
        self.execute_raw("BEGIN IMMEDIATE")
    }

    /// Commit the transaction started with
    /// [`begin_transaction`](Self::begin_transaction).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or
    /// [`StoreError::ExecuteFailed`] if no transaction is active or the
    /// commit fails.
    pub fn commit_transaction(&self) -> Result<()> {
        self.execute_raw("COMMIT")
    }

    /// Roll back the transaction started with
    /// [`begin_transaction`](Self::begin_transaction).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, or
    /// [`StoreError::ExecuteFailed`] if no transaction is active.
    pub fn rollback_transaction(&self) -> Result<()> {
        self.execute_raw("ROLLBACK")
    }

    /// Run `work` inside a transaction: commit on success, roll back on
    /// failure. A rollback failure is logged and suppressed; the original
    /// error from `work` propagates.
    ///
    /// `work` receives a [`Session`] and must issue every statement
    /// through it; calling back into the `WorkStore` from inside `work`
    /// fails with [`StoreError::Reentrant`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotOpen`] if no connection is live, the
    /// failure from `work`, or [`StoreError::ExecuteFailed`] if the
    /// commit fails.
    pub fn in_transaction<R, F>(&self, work: F) -> Result<R>
    where
        F: FnOnce(&Session<'_>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.queue.run(move |state| state.in_transaction(work))
    }
}
