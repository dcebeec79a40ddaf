#![allow(dead_code)]

//! Shared fixtures for store integration tests: temp-dir backed stores and
//! row helpers that go through the public API only.

use chrono::Utc;
use tempfile::TempDir;
use workstore::session::{bind_integer, bind_text, bind_timestamp, read_integer, read_text};
use workstore::{StoreConfig, StoreError, WorkStore};

/// A store on a fresh temp directory. The directory is removed when the
/// fixture drops, so keep it alive for the duration of the test.
pub struct TestStore {
    pub dir: TempDir,
    pub config: StoreConfig,
    pub store: WorkStore,
}

/// New handle on a fresh temp directory; not yet opened.
pub fn test_store() -> TestStore {
    let dir = TempDir::new().expect("temp dir");
    let config = StoreConfig::new(dir.path().join("work.db"), dir.path().join("legacy.db"));
    let store = WorkStore::new(config.clone()).expect("spawn store");
    TestStore { dir, config, store }
}

/// New handle over an existing fixture's paths (a second process-lifetime
/// against the same files).
pub fn reattach(fixture: &TestStore) -> WorkStore {
    WorkStore::new(fixture.config.clone()).expect("spawn store")
}

pub fn wrap(source: rusqlite::Error) -> StoreError {
    StoreError::ExecuteFailed { source }
}

pub fn insert_task(store: &WorkStore, id: &str, title: &str) {
    let id = id.to_string();
    let title = title.to_string();
    let completed = store
        .execute_update(
            "INSERT INTO tasks (id, title, query, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            move |stmt| {
                let now = Utc::now();
                bind_text(stmt, 1, Some(&id))?;
                bind_text(stmt, 2, Some(&title))?;
                bind_text(stmt, 3, Some("query"))?;
                bind_timestamp(stmt, 4, now)?;
                bind_timestamp(stmt, 5, now)
            },
        )
        .expect("insert task");
    assert!(completed);
}

pub fn insert_issue(store: &WorkStore, id: &str, task_id: &str) {
    let id = id.to_string();
    let task_id = task_id.to_string();
    let completed = store
        .execute_update(
            "INSERT INTO issues (id, task_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            move |stmt| {
                let now = Utc::now();
                bind_text(stmt, 1, Some(&id))?;
                bind_text(stmt, 2, Some(&task_id))?;
                bind_text(stmt, 3, Some("Issue"))?;
                bind_timestamp(stmt, 4, now)?;
                bind_timestamp(stmt, 5, now)
            },
        )
        .expect("insert issue");
    assert!(completed);
}

pub fn insert_dependency(
    store: &WorkStore,
    id: &str,
    from: &str,
    to: &str,
) -> workstore::Result<bool> {
    let id = id.to_string();
    let from = from.to_string();
    let to = to.to_string();
    store.execute_update(
        "INSERT INTO dependencies (id, from_issue_id, to_issue_id, type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        move |stmt| {
            bind_text(stmt, 1, Some(&id))?;
            bind_text(stmt, 2, Some(&from))?;
            bind_text(stmt, 3, Some(&to))?;
            bind_text(stmt, 4, Some("blocks"))?;
            bind_timestamp(stmt, 5, Utc::now())
        },
    )
}

pub fn insert_event(store: &WorkStore, issue_id: &str, event_type: &str) {
    let issue_id = issue_id.to_string();
    let event_type = event_type.to_string();
    store
        .execute_update(
            "INSERT INTO events (issue_id, event_type, payload, created_at)
             VALUES (?1, ?2, NULL, ?3)",
            move |stmt| {
                bind_text(stmt, 1, Some(&issue_id))?;
                bind_text(stmt, 2, Some(&event_type))?;
                bind_timestamp(stmt, 3, Utc::now())
            },
        )
        .expect("insert event");
}

pub fn insert_artifact(store: &WorkStore, id: &str, task_id: &str) {
    let id = id.to_string();
    let task_id = task_id.to_string();
    store
        .execute_update(
            "INSERT INTO artifacts (id, task_id, filename, content, content_type, created_at)
             VALUES (?1, ?2, 'result.md', 'content', 'text/markdown', ?3)",
            move |stmt| {
                bind_text(stmt, 1, Some(&id))?;
                bind_text(stmt, 2, Some(&task_id))?;
                bind_timestamp(stmt, 3, Utc::now())
            },
        )
        .expect("insert artifact");
}

pub fn insert_turn(store: &WorkStore, id: &str, issue_id: &str, turn_order: i64) {
    let id = id.to_string();
    let issue_id = issue_id.to_string();
    store
        .execute_update(
            "INSERT INTO conversation_turns (id, issue_id, turn_order, role, content, created_at)
             VALUES (?1, ?2, ?3, 'user', 'hello', ?4)",
            move |stmt| {
                bind_text(stmt, 1, Some(&id))?;
                bind_text(stmt, 2, Some(&issue_id))?;
                bind_integer(stmt, 3, turn_order)?;
                bind_timestamp(stmt, 4, Utc::now())
            },
        )
        .expect("insert turn");
}

/// `SELECT COUNT(*)` through the public executor surface.
pub fn count_rows(store: &WorkStore, table: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    store
        .prepare_and_execute(
            &sql,
            |_| Ok(()),
            |stmt| {
                let mut rows = stmt.raw_query();
                let row = rows.next().map_err(wrap)?.expect("count row");
                read_integer(row, 0)
            },
        )
        .expect("count rows")
}

/// Titles of all tasks, ordered by id.
pub fn task_titles(store: &WorkStore) -> Vec<String> {
    store
        .prepare_and_execute(
            "SELECT title FROM tasks ORDER BY id",
            |_| Ok(()),
            |stmt| {
                let mut titles = Vec::new();
                let mut rows = stmt.raw_query();
                while let Some(row) = rows.next().map_err(wrap)? {
                    if let Some(title) = read_text(row, 0)? {
                        titles.push(title);
                    }
                }
                Ok(titles)
            },
        )
        .expect("read titles")
}

/// Persisted schema version, read through the public executor surface.
pub fn stored_schema_version(store: &WorkStore) -> i64 {
    store
        .prepare_and_execute(
            "PRAGMA user_version",
            |_| Ok(()),
            |stmt| {
                let mut rows = stmt.raw_query();
                let row = rows.next().map_err(wrap)?.expect("version row");
                read_integer(row, 0)
            },
        )
        .expect("read schema version")
}
