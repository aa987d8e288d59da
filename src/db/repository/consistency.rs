use rusqlite::Connection;

use crate::db::DatabaseError;

/// A block whose partition is owned by a different module.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct OwnershipViolation {
    pub block_id: i64,
    pub block_module_id: i64,
    pub partition_id: i64,
    pub partition_module_id: i64,
}

/// Find every block breaking the block/partition same-module rule.
///
/// The insert trigger should keep this empty; the check exists for databases
/// written by older tooling or edited by hand.
pub fn check_block_ownership(conn: &Connection) -> Result<Vec<OwnershipViolation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.module_id, p.id, p.module_id
         FROM blocks b
         JOIN partitions p ON p.id = b.partition_id
         WHERE p.module_id != b.module_id
         ORDER BY b.id",
    )?;
    let violations = stmt
        .query_map([], |row| {
            Ok(OwnershipViolation {
                block_id: row.get(0)?,
                block_module_id: row.get(1)?,
                partition_id: row.get(2)?,
                partition_module_id: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(violations)
}

/// Count modules, partitions, blocks and regions reachable from one test case.
pub fn count_graph(conn: &Connection, test_case_id: i64) -> Result<GraphCounts, DatabaseError> {
    let counts = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM modules m WHERE m.test_case_id = ?1),
            (SELECT COUNT(*) FROM partitions p
               JOIN modules m ON m.id = p.module_id WHERE m.test_case_id = ?1),
            (SELECT COUNT(*) FROM blocks b
               JOIN modules m ON m.id = b.module_id WHERE m.test_case_id = ?1),
            (SELECT COUNT(*) FROM regions r
               JOIN blocks b ON b.id = r.block_id
               JOIN modules m ON m.id = b.module_id WHERE m.test_case_id = ?1)",
        [test_case_id],
        |row| {
            Ok(GraphCounts {
                modules: row.get(0)?,
                partitions: row.get(1)?,
                blocks: row.get(2)?,
                regions: row.get(3)?,
            })
        },
    )?;
    Ok(counts)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GraphCounts {
    pub modules: i64,
    pub partitions: i64,
    pub blocks: i64,
    pub regions: i64,
}
