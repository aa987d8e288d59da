//! Command-line surface: `ingest` a directory, `show` a stored test case.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::config::IngestConfig;
use crate::db::{self, DatabaseError};
use crate::models::{Block, Module, Partition, Region, TestCase};
use crate::pipeline::executor::BoundedExecutor;
use crate::pipeline::ingest::{FileOutcome, IngestError, IngestReport, Ingestor, SqliteLayoutStore};

#[derive(Debug, Parser)]
#[command(
    name = "memlayout",
    version,
    about = "Decompose memory-layout descriptions into a relational graph"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest every YAML/JSON file under a directory as one test case.
    Ingest(IngestArgs),
    /// Print a stored test case and its module graph.
    Show(ShowArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Directory holding the extracted layout files.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
    /// SQLite database (defaults to MEMLAYOUT_DB or ~/.memlayout/memlayout.db).
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
    /// Maximum concurrent parse operations.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
    /// Print the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Test case id printed by `ingest`.
    #[arg(value_name = "ID")]
    pub test_case_id: i64,
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Cannot create database directory {}: {source}", path.display())]
    DatabaseDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Execute one command. `Ok(false)` means the command ran but the run it
/// describes ended in `error`.
pub async fn run(cli: Cli) -> Result<bool, CliError> {
    match cli.command {
        Commands::Ingest(args) => ingest(args).await,
        Commands::Show(args) => show(args),
    }
}

fn resolve_config(db: Option<PathBuf>, concurrency: Option<usize>) -> IngestConfig {
    let mut config = IngestConfig::from_env();
    if let Some(path) = db {
        config.database_path = path;
    }
    if let Some(n) = concurrency {
        config.parse_concurrency = n;
    }
    config
}

fn open_store(path: &Path) -> Result<SqliteLayoutStore, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CliError::DatabaseDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(SqliteLayoutStore::open(path)?)
}

async fn ingest(args: IngestArgs) -> Result<bool, CliError> {
    let config = resolve_config(args.db, args.concurrency);
    let executor = BoundedExecutor::new(config.parse_concurrency).map_err(IngestError::from)?;
    let store = Arc::new(open_store(&config.database_path)?);

    tracing::info!(
        db = %config.database_path.display(),
        concurrency = config.parse_concurrency,
        "Opened layout database"
    );

    let ingestor = Ingestor::new(executor, store);
    let report = ingestor.process_directory(&args.dir).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(report.is_success())
}

fn print_report(report: &IngestReport) {
    println!(
        "test case {} '{}': {} ({} ingested, {} failed)",
        report.test_case_id,
        report.name,
        report.status,
        report.ingested_count(),
        report.failed_count()
    );
    for (path, outcome) in &report.files {
        match outcome {
            FileOutcome::Ingested {
                module_id,
                partitions,
                blocks,
                regions,
            } => println!(
                "  ok    {path}: module {module_id} ({partitions} partitions, {blocks} blocks, {regions} regions)"
            ),
            FileOutcome::Failed { kind, message } => {
                println!("  FAIL  {path}: [{kind}] {message}")
            }
        }
    }
}

/// Stored graph of one test case, as printed by `show`.
#[derive(Debug, Serialize)]
pub struct CaseView {
    pub test_case: TestCase,
    pub modules: Vec<ModuleView>,
}

#[derive(Debug, Serialize)]
pub struct ModuleView {
    #[serde(flatten)]
    pub module: Module,
    pub blocks: Vec<BlockView>,
    pub partitions: Vec<PartitionView>,
}

#[derive(Debug, Serialize)]
pub struct PartitionView {
    #[serde(flatten)]
    pub partition: Partition,
    pub blocks: Vec<BlockView>,
}

#[derive(Debug, Serialize)]
pub struct BlockView {
    #[serde(flatten)]
    pub block: Block,
    pub regions: Vec<Region>,
}

/// Load one test case with its full graph.
pub fn load_case(conn: &rusqlite::Connection, id: i64) -> Result<Option<CaseView>, DatabaseError> {
    let Some(test_case) = db::get_test_case(conn, id)? else {
        return Ok(None);
    };

    let block_view = |block: Block| -> Result<BlockView, DatabaseError> {
        let regions = db::list_regions_for_block(conn, block.id)?;
        Ok(BlockView { block, regions })
    };

    let mut modules = Vec::new();
    for module in db::list_modules_for_test_case(conn, id)? {
        let blocks = db::list_blocks_for_module(conn, module.id)?
            .into_iter()
            .filter(|b| b.partition_id.is_none())
            .map(|b| block_view(b))
            .collect::<Result<Vec<_>, _>>()?;

        let mut partitions = Vec::new();
        for partition in db::list_partitions_for_module(conn, module.id)? {
            let blocks = db::list_blocks_for_partition(conn, partition.id)?
                .into_iter()
                .map(|b| block_view(b))
                .collect::<Result<Vec<_>, _>>()?;
            partitions.push(PartitionView { partition, blocks });
        }

        modules.push(ModuleView {
            module,
            blocks,
            partitions,
        });
    }

    Ok(Some(CaseView { test_case, modules }))
}

fn show(args: ShowArgs) -> Result<bool, CliError> {
    let config = resolve_config(args.db, None);
    let store = open_store(&config.database_path)?;

    let view = store.with_connection(|conn| {
        let violations = db::check_block_ownership(conn)?;
        if !violations.is_empty() {
            tracing::warn!(count = violations.len(), "Blocks attached to another module's partition");
        }
        load_case(conn, args.test_case_id)
    })?;

    let Some(view) = view else {
        return Err(DatabaseError::NotFound {
            entity_type: "TestCase".into(),
            id: args.test_case_id,
        }
        .into());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        let case = &view.test_case;
        println!("test case {} '{}': {}", case.id, case.name, case.status);
        if let Some(message) = &case.error_message {
            println!("  {message}");
        }
        for m in &view.modules {
            println!("  module {} '{}'", m.module.id, m.module.name);
            for b in &m.blocks {
                println!("    block '{}' ({} regions)", b.block.name, b.regions.len());
            }
            for p in &m.partitions {
                println!(
                    "    partition '{}' space {} ({} blocks)",
                    p.partition.name,
                    p.partition.space_id,
                    p.blocks.len()
                );
            }
        }
    }
    Ok(view.test_case.status != crate::models::TestStatus::Error)
}
