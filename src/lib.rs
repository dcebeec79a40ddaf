//! Embedded, versioned, transactional work store on SQLite.
//!
//! The store persists a small relational schema (tasks, issues,
//! dependencies, append-only events, artifacts, conversation turns) in a
//! single file, on a single-process, single-writer basis. One
//! [`WorkStore`] handle is built per process from a [`StoreConfig`] and
//! cloned to every collaborator; all operations are serialized through a
//! dedicated worker thread that exclusively owns the connection.
//!
//! Opening the store runs forward-only schema migrations (gated by the
//! file's persisted schema version) and a one-time legacy-recovery check,
//! and reports both outcomes in an [`OpenReport`].
//!
//! ```no_run
//! use workstore::{StoreConfig, WorkStore};
//!
//! # fn main() -> workstore::Result<()> {
//! let store = WorkStore::new(StoreConfig::new("data/work.db", "data/legacy.db"))?;
//! let report = store.open()?;
//! assert_eq!(report.schema_version, workstore::LATEST_SCHEMA_VERSION);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
mod queue;
pub mod recovery;
pub mod schema;
pub mod session;
pub mod store;
pub mod time;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use recovery::RecoveryOutcome;
pub use schema::LATEST_SCHEMA_VERSION;
pub use session::Session;
pub use store::{OpenReport, WorkStore};
