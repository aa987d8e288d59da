use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_module(
    conn: &Connection,
    test_case_id: i64,
    name: &str,
    address_space_base: Option<i64>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO modules (test_case_id, name, address_space_base) VALUES (?1, ?2, ?3)",
        params![test_case_id, name, address_space_base],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_module(conn: &Connection, id: i64) -> Result<Option<Module>, DatabaseError> {
    let module = conn
        .query_row(
            "SELECT id, test_case_id, name, address_space_base FROM modules WHERE id = ?1",
            params![id],
            module_from_row,
        )
        .optional()?;
    Ok(module)
}

pub fn list_modules_for_test_case(
    conn: &Connection,
    test_case_id: i64,
) -> Result<Vec<Module>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, test_case_id, name, address_space_base
         FROM modules WHERE test_case_id = ?1 ORDER BY id",
    )?;
    let modules = stmt
        .query_map(params![test_case_id], module_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(modules)
}

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<Module> {
    Ok(Module {
        id: row.get(0)?,
        test_case_id: row.get(1)?,
        name: row.get(2)?,
        address_space_base: row.get(3)?,
    })
}
