//! Serialization tests: concurrent callers over cloned handles never
//! interleave, and transactional units stay atomic under contention.

mod common;

use chrono::Utc;
use common::{count_rows, insert_task, test_store, wrap};
use std::thread;
use workstore::session::{bind_integer, bind_text, bind_timestamp, read_integer};

const WRITERS: usize = 8;
const ROUNDS: i64 = 25;

#[test]
fn concurrent_writes_all_land() {
    let fixture = test_store();
    fixture.store.open().unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = fixture.store.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let id = format!("t-{writer}-{round}");
                    insert_task(&store, &id, "concurrent");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected = i64::try_from(WRITERS).unwrap() * ROUNDS;
    assert_eq!(count_rows(&fixture.store, "tasks"), expected);
}

#[test]
fn concurrent_transactions_stay_atomic() {
    let fixture = test_store();
    fixture.store.open().unwrap();
    insert_task(&fixture.store, "t1", "Title");

    // Each transaction writes an issue and two turns; a torn transaction
    // would leave an issue whose turn count is not exactly 2.
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let store = fixture.store.clone();
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let issue_id = format!("i-{writer}-{round}");
                    store
                        .in_transaction(move |session| {
                            let now = Utc::now();
                            session.execute_update(
                                "INSERT INTO issues (id, task_id, title, created_at, updated_at)
                                 VALUES (?1, 't1', 'Issue', ?2, ?3)",
                                |stmt| {
                                    bind_text(stmt, 1, Some(&issue_id))?;
                                    bind_timestamp(stmt, 2, now)?;
                                    bind_timestamp(stmt, 3, now)
                                },
                            )?;
                            for turn in 0..2 {
                                let turn_id = format!("{issue_id}-turn-{turn}");
                                session.execute_update(
                                    "INSERT INTO conversation_turns
                                         (id, issue_id, turn_order, role, content, created_at)
                                     VALUES (?1, ?2, ?3, 'assistant', 'text', ?4)",
                                    |stmt| {
                                        bind_text(stmt, 1, Some(&turn_id))?;
                                        bind_text(stmt, 2, Some(&issue_id))?;
                                        bind_integer(stmt, 3, turn)?;
                                        bind_timestamp(stmt, 4, Utc::now())
                                    },
                                )?;
                            }
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected_issues = i64::try_from(WRITERS).unwrap() * ROUNDS;
    assert_eq!(count_rows(&fixture.store, "issues"), expected_issues);
    assert_eq!(
        count_rows(&fixture.store, "conversation_turns"),
        expected_issues * 2
    );

    // No issue was left with a torn pair of turns.
    let torn = fixture
        .store
        .prepare_and_execute(
            "SELECT COUNT(*) FROM (
                 SELECT issue_id FROM conversation_turns
                 GROUP BY issue_id HAVING COUNT(*) != 2
             )",
            |_| Ok(()),
            |stmt| {
                let mut rows = stmt.raw_query();
                let row = rows.next().map_err(wrap)?.expect("count row");
                read_integer(row, 0)
            },
        )
        .unwrap();
    assert_eq!(torn, 0);
}

#[test]
fn is_open_is_serialized_with_lifecycle_changes() {
    let fixture = test_store();
    fixture.store.open().unwrap();

    let flipper = {
        let store = fixture.store.clone();
        thread::spawn(move || {
            for _ in 0..50 {
                store.close().unwrap();
                store.open().unwrap();
            }
        })
    };
    let observer = {
        let store = fixture.store.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                // Must never error: the queue serializes observation
                // against open/close.
                store.is_open().unwrap();
            }
        })
    };

    flipper.join().unwrap();
    observer.join().unwrap();
    assert!(fixture.store.is_open().unwrap());
}

#[test]
fn clones_share_one_store() {
    let fixture = test_store();
    fixture.store.open().unwrap();

    let clone = fixture.store.clone();
    insert_task(&clone, "t1", "Via clone");
    assert_eq!(count_rows(&fixture.store, "tasks"), 1);

    clone.close().unwrap();
    assert!(!fixture.store.is_open().unwrap());
}
