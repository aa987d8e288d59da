use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_partition(
    conn: &Connection,
    module_id: i64,
    name: &str,
    space_id: i64,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO partitions (module_id, name, space_id) VALUES (?1, ?2, ?3)",
        params![module_id, name, space_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_partitions_for_module(
    conn: &Connection,
    module_id: i64,
) -> Result<Vec<Partition>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, module_id, name, space_id FROM partitions WHERE module_id = ?1 ORDER BY id",
    )?;
    let partitions = stmt
        .query_map(params![module_id], partition_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(partitions)
}

fn partition_from_row(row: &Row<'_>) -> rusqlite::Result<Partition> {
    Ok(Partition {
        id: row.get(0)?,
        module_id: row.get(1)?,
        name: row.get(2)?,
        space_id: row.get(3)?,
    })
}
