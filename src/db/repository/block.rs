use rusqlite::{params, Connection, Row};

use crate::db::DatabaseError;
use crate::models::*;

const BLOCK_COLUMNS: &str = "id, module_id, partition_id, name, access, align, cache_policy,
    content_type, init_file, init_stage, init_type, is_contiguous, is_shadow, is_shareable,
    is_system, no_shadow, paddr, vaddr, size, shadow_offset, shadow_scale, shadow_type,
    safety_zone_before, safety_zone_before_unmapped, safety_zone_after, safety_zone_after_unmapped";

/// Insert a block owned by `module_id`, optionally inside `partition_id`.
///
/// The partition must belong to the same module; the schema trigger
/// `blocks_partition_same_module` aborts the insert otherwise.
pub fn insert_block(
    conn: &Connection,
    module_id: i64,
    partition_id: Option<i64>,
    name: &str,
    attrs: &BlockAttributes,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO blocks (module_id, partition_id, name, access, align, cache_policy,
         content_type, init_file, init_stage, init_type, is_contiguous, is_shadow, is_shareable,
         is_system, no_shadow, paddr, vaddr, size, shadow_offset, shadow_scale, shadow_type,
         safety_zone_before, safety_zone_before_unmapped, safety_zone_after,
         safety_zone_after_unmapped)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
         ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        params![
            module_id,
            partition_id,
            name,
            attrs.access,
            attrs.align,
            attrs.cache_policy,
            attrs.content_type,
            attrs.init_file,
            attrs.init_stage,
            attrs.init_type,
            attrs.is_contiguous as i32,
            attrs.is_shadow as i32,
            attrs.is_shareable as i32,
            attrs.is_system as i32,
            attrs.no_shadow as i32,
            attrs.paddr,
            attrs.vaddr,
            attrs.size,
            attrs.shadow_offset,
            attrs.shadow_scale,
            attrs.shadow_type,
            attrs.safety_zone_before,
            attrs.safety_zone_before_unmapped as i32,
            attrs.safety_zone_after,
            attrs.safety_zone_after_unmapped as i32,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All blocks of a module, partitioned or not.
pub fn list_blocks_for_module(conn: &Connection, module_id: i64) -> Result<Vec<Block>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE module_id = ?1 ORDER BY id"
    ))?;
    let blocks = stmt
        .query_map(params![module_id], block_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}

pub fn list_blocks_for_partition(
    conn: &Connection,
    partition_id: i64,
) -> Result<Vec<Block>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BLOCK_COLUMNS} FROM blocks WHERE partition_id = ?1 ORDER BY id"
    ))?;
    let blocks = stmt
        .query_map(params![partition_id], block_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(blocks)
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: row.get(0)?,
        module_id: row.get(1)?,
        partition_id: row.get(2)?,
        name: row.get(3)?,
        attributes: BlockAttributes {
            access: row.get(4)?,
            align: row.get(5)?,
            cache_policy: row.get(6)?,
            content_type: row.get(7)?,
            init_file: row.get(8)?,
            init_stage: row.get(9)?,
            init_type: row.get(10)?,
            is_contiguous: row.get::<_, i32>(11)? != 0,
            is_shadow: row.get::<_, i32>(12)? != 0,
            is_shareable: row.get::<_, i32>(13)? != 0,
            is_system: row.get::<_, i32>(14)? != 0,
            no_shadow: row.get::<_, i32>(15)? != 0,
            paddr: row.get(16)?,
            vaddr: row.get(17)?,
            size: row.get(18)?,
            shadow_offset: row.get(19)?,
            shadow_scale: row.get(20)?,
            shadow_type: row.get(21)?,
            safety_zone_before: row.get(22)?,
            safety_zone_before_unmapped: row.get::<_, i32>(23)? != 0,
            safety_zone_after: row.get(24)?,
            safety_zone_after_unmapped: row.get::<_, i32>(25)? != 0,
        },
    })
}
