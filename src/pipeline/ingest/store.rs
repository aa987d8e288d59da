//! Storage seam between the orchestrator and the database.
//!
//! Writes are short. The pending test case is committed by `begin_run`,
//! each file's graph commits in its own transaction, and `finish_run` is a
//! single update. Several runs can share one store and interleave, and no
//! run holds SQLite's write lock while files are parsed. A run that cannot
//! finish is undone with `abort_run`, which deletes only that run's rows.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use super::decompose::{BlockDraft, ModuleDraft};
use crate::db::{self, DatabaseError};
use crate::models::TestStatus;

/// Storage operations an ingestion run needs.
///
/// Methods are blocking; the orchestrator calls them from `spawn_blocking`.
pub trait LayoutStore: Send + Sync + 'static {
    /// Create the run's pending test case.
    fn begin_run(&self, name: &str) -> Result<i64, DatabaseError>;

    /// Write one module graph. On error nothing of this module remains.
    fn persist_module(&self, test_case_id: i64, draft: &ModuleDraft) -> Result<i64, DatabaseError>;

    /// Record the terminal status.
    fn finish_run(
        &self,
        test_case_id: i64,
        status: TestStatus,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError>;

    /// Discard the test case and everything written under it.
    fn abort_run(&self, test_case_id: i64) -> Result<(), DatabaseError>;
}

/// [`LayoutStore`] over a single SQLite connection.
pub struct SqliteLayoutStore {
    conn: Mutex<Connection>,
}

impl SqliteLayoutStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::new(db::open_memory_database()?))
    }

    /// Run a read or ad-hoc statement against the underlying connection.
    pub fn with_connection<T>(
        &self,
        op: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let conn = self.lock()?;
        op(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }
}

impl LayoutStore for SqliteLayoutStore {
    fn begin_run(&self, name: &str) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        let id = db::insert_test_case(&conn, name)?;
        tracing::info!(test_case_id = id, name, "Ingestion run started");
        Ok(id)
    }

    fn persist_module(&self, test_case_id: i64, draft: &ModuleDraft) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let module_id = db::insert_module(&tx, test_case_id, &draft.name, draft.address_space_base)?;
        for block in &draft.blocks {
            write_block(&tx, module_id, None, block)?;
        }
        for partition in &draft.partitions {
            let partition_id =
                db::insert_partition(&tx, module_id, &partition.name, partition.space_id)?;
            for block in &partition.blocks {
                write_block(&tx, module_id, Some(partition_id), block)?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            test_case_id,
            module_id,
            module = %draft.name,
            blocks = draft.block_count(),
            "Module graph stored"
        );
        Ok(module_id)
    }

    fn finish_run(
        &self,
        test_case_id: i64,
        status: TestStatus,
        error_message: Option<&str>,
    ) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        db::finalize_test_case(&conn, test_case_id, status, error_message)?;
        tracing::info!(test_case_id, status = status.as_str(), "Ingestion run finished");
        Ok(())
    }

    fn abort_run(&self, test_case_id: i64) -> Result<(), DatabaseError> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let removed = db::delete_test_case_graph(&tx, test_case_id)?;
        tx.commit()?;
        tracing::warn!(test_case_id, rows = removed, "Ingestion run discarded");
        Ok(())
    }
}

fn write_block(
    conn: &Connection,
    module_id: i64,
    partition_id: Option<i64>,
    block: &BlockDraft,
) -> Result<i64, DatabaseError> {
    let block_id = db::insert_block(conn, module_id, partition_id, &block.name, &block.attributes)?;
    for region in &block.regions {
        db::insert_region(conn, block_id, region.paddr, region.size, region.vaddr)?;
    }
    Ok(block_id)
}
