use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

pub fn insert_region(
    conn: &Connection,
    block_id: i64,
    paddr: i64,
    size: i64,
    vaddr: i64,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO regions (block_id, paddr, size, vaddr) VALUES (?1, ?2, ?3, ?4)",
        params![block_id, paddr, size, vaddr],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_regions_for_block(conn: &Connection, block_id: i64) -> Result<Vec<Region>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, block_id, paddr, size, vaddr FROM regions WHERE block_id = ?1 ORDER BY id",
    )?;
    let regions = stmt
        .query_map(params![block_id], region_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(regions)
}

fn region_from_row(row: &Row<'_>) -> rusqlite::Result<Region> {
    Ok(Region {
        id: row.get(0)?,
        block_id: row.get(1)?,
        paddr: row.get(2)?,
        size: row.get(3)?,
        vaddr: row.get(4)?,
    })
}
