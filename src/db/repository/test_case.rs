use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::*;

/// Insert a pending test case and return its assigned id.
pub fn insert_test_case(conn: &Connection, name: &str) -> Result<i64, DatabaseError> {
    let created_at = chrono::Local::now().naive_local();
    conn.execute(
        "INSERT INTO test_cases (name, status, created_at) VALUES (?1, ?2, ?3)",
        params![name, TestStatus::Pending.as_str(), created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_test_case(conn: &Connection, id: i64) -> Result<Option<TestCase>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, status, error_message, created_at, finished_at
             FROM test_cases WHERE id = ?1",
            params![id],
            |row| {
                Ok(TestCaseRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    status: row.get(2)?,
                    error_message: row.get(3)?,
                    created_at: row.get(4)?,
                    finished_at: row.get(5)?,
                })
            },
        )
        .optional()?;

    row.map(test_case_from_row).transpose()
}

/// Move a test case to its terminal status.
///
/// This is the only write that touches an existing row. Anything other than
/// `pending -> parsed|error` is rejected with `InvalidTransition`.
pub fn finalize_test_case(
    conn: &Connection,
    id: i64,
    status: TestStatus,
    error_message: Option<&str>,
) -> Result<(), DatabaseError> {
    let current = get_test_case(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "TestCase".into(),
        id,
    })?;

    if !current.status.can_transition_to(status) {
        return Err(DatabaseError::InvalidTransition {
            id,
            from: current.status.as_str().into(),
            to: status.as_str().into(),
        });
    }

    let finished_at = chrono::Local::now().naive_local();
    conn.execute(
        "UPDATE test_cases SET status = ?2, error_message = ?3, finished_at = ?4
         WHERE id = ?1 AND status = 'pending'",
        params![id, status.as_str(), error_message, finished_at],
    )?;

    tracing::debug!(test_case_id = id, status = status.as_str(), "Test case finalized");
    Ok(())
}

/// Remove a test case and every row it owns, children first.
///
/// Callers wrap this in a transaction; it is how an aborted run discards
/// what it already committed.
pub fn delete_test_case_graph(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let mut removed = conn.execute(
        "DELETE FROM regions WHERE block_id IN (
             SELECT b.id FROM blocks b JOIN modules m ON b.module_id = m.id
             WHERE m.test_case_id = ?1)",
        params![id],
    )?;
    removed += conn.execute(
        "DELETE FROM blocks WHERE module_id IN (SELECT id FROM modules WHERE test_case_id = ?1)",
        params![id],
    )?;
    removed += conn.execute(
        "DELETE FROM partitions WHERE module_id IN (SELECT id FROM modules WHERE test_case_id = ?1)",
        params![id],
    )?;
    removed += conn.execute("DELETE FROM modules WHERE test_case_id = ?1", params![id])?;
    removed += conn.execute("DELETE FROM test_cases WHERE id = ?1", params![id])?;
    Ok(removed)
}

// Internal row type for TestCase mapping
struct TestCaseRow {
    id: i64,
    name: String,
    status: String,
    error_message: Option<String>,
    created_at: NaiveDateTime,
    finished_at: Option<NaiveDateTime>,
}

fn test_case_from_row(row: TestCaseRow) -> Result<TestCase, DatabaseError> {
    Ok(TestCase {
        id: row.id,
        name: row.name,
        status: TestStatus::from_str(&row.status)?,
        error_message: row.error_message,
        created_at: row.created_at,
        finished_at: row.finished_at,
    })
}
