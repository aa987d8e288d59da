//! Ingestion orchestrator.
//!
//! Drives one run over a directory: create the test case, fan out one task
//! per file (read and parse inside an executor slot, then decompose and
//! persist), wait for every task, then record the aggregate status.
//! A failing file is recorded in the report and never cancels its siblings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use serde::Serialize;

use super::decompose::decompose;
use super::format::detect_format;
use super::parser::{parse_document, Node};
use super::store::LayoutStore;
use super::{FailureKind, IngestError};
use crate::db::DatabaseError;
use crate::models::TestStatus;
use crate::pipeline::executor::BoundedExecutor;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Ingested {
        module_id: i64,
        partitions: usize,
        blocks: usize,
        regions: usize,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

impl FileOutcome {
    pub fn module_id(&self) -> Option<i64> {
        match self {
            Self::Ingested { module_id, .. } => Some(*module_id),
            Self::Failed { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Ingested { .. } => None,
            Self::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Result of one `process_directory` call.
///
/// `files` is keyed by path relative to the ingested directory, `/`-separated.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub test_case_id: i64,
    pub name: String,
    pub status: TestStatus,
    pub error_message: Option<String>,
    pub files: BTreeMap<String, FileOutcome>,
}

impl IngestReport {
    pub fn failed_count(&self) -> usize {
        self.files
            .values()
            .filter(|o| matches!(o, FileOutcome::Failed { .. }))
            .count()
    }

    pub fn ingested_count(&self) -> usize {
        self.files.len() - self.failed_count()
    }

    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Parsed
    }
}

/// Status and message summarising all file outcomes.
fn aggregate(files: &BTreeMap<String, FileOutcome>) -> (TestStatus, Option<String>) {
    let failed: Vec<String> = files
        .iter()
        .filter_map(|(path, outcome)| {
            outcome
                .failure_kind()
                .map(|kind| format!("{path} ({kind})"))
        })
        .collect();

    if failed.is_empty() {
        (TestStatus::Parsed, None)
    } else {
        let message = format!(
            "{} of {} files failed: {}",
            failed.len(),
            files.len(),
            failed.join(", ")
        );
        (TestStatus::Error, Some(message))
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Runs ingestion over directories with an injected executor and store.
pub struct Ingestor<S: LayoutStore> {
    executor: BoundedExecutor,
    store: Arc<S>,
}

impl<S: LayoutStore> Ingestor<S> {
    pub fn new(executor: BoundedExecutor, store: Arc<S>) -> Self {
        Self { executor, store }
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Ingest every regular file under `dir` into one new test case.
    ///
    /// Only an invalid or unlistable `dir`, or a storage failure while
    /// opening or closing the run, is returned as `Err`; every per-file
    /// problem lands in the report instead. Unreadable subdirectories and
    /// directory symlinks are skipped.
    ///
    /// Runs on one `Ingestor` may overlap; each owns its test case and a
    /// failed run discards only its own rows.
    pub async fn process_directory(&self, dir: &Path) -> Result<IngestReport, IngestError> {
        let start = Instant::now();

        let is_dir = tokio::fs::metadata(dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(IngestError::NotADirectory(dir.to_path_buf()));
        }

        let name = run_name(dir);
        let root = dir.to_path_buf();
        let files = tokio::task::spawn_blocking(move || collect_files(&root))
            .await
            .map_err(|e| DatabaseError::BackgroundTask(e.to_string()))??;

        let begin_name = name.clone();
        let test_case_id = self.with_store(move |s| s.begin_run(&begin_name)).await?;

        tracing::info!(
            test_case_id,
            dir = %dir.display(),
            files = files.len(),
            capacity = self.executor.capacity(),
            "Ingesting directory"
        );

        let tasks = files
            .iter()
            .map(|(rel, path)| self.process_file(test_case_id, rel, path));
        let outcomes = join_all(tasks).await;

        let files: BTreeMap<String, FileOutcome> = files
            .into_iter()
            .map(|(rel, _)| rel)
            .zip(outcomes)
            .collect();

        let (status, error_message) = aggregate(&files);
        let message = error_message.clone();
        if let Err(e) = self
            .with_store(move |s| s.finish_run(test_case_id, status, message.as_deref()))
            .await
        {
            return Err(self.abort(test_case_id, e).await);
        }

        let report = IngestReport {
            test_case_id,
            name,
            status,
            error_message,
            files,
        };

        tracing::info!(
            test_case_id,
            status = status.as_str(),
            ingested = report.ingested_count(),
            failed = report.failed_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Ingestion finished"
        );

        Ok(report)
    }

    async fn process_file(&self, test_case_id: i64, rel: &str, path: &Path) -> FileOutcome {
        match self.ingest_file(test_case_id, rel, path).await {
            Ok(outcome) => {
                tracing::debug!(file = %rel, module_id = ?outcome.module_id(), "File ingested");
                outcome
            }
            Err(e) => {
                tracing::warn!(file = %rel, kind = e.kind().as_str(), error = %e, "File failed");
                FileOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }

    async fn ingest_file(
        &self,
        test_case_id: i64,
        rel: &str,
        path: &Path,
    ) -> Result<FileOutcome, IngestError> {
        let format = detect_format(rel);
        let name = rel.to_string();
        let path = path.to_path_buf();

        // File bytes only exist while a slot is held.
        let tree = self
            .executor
            .submit("read_parse", move || -> Result<Node, IngestError> {
                let bytes = std::fs::read(&path)?;
                if bytes.is_empty() {
                    return Err(IngestError::EmptyFile);
                }
                if !format.is_supported() {
                    return Err(IngestError::UnsupportedFormat(name));
                }
                Ok(parse_document(&bytes, format)?)
            })
            .await??;
        let draft = decompose(&tree)?;

        let (partitions, blocks, regions) =
            (draft.partition_count(), draft.block_count(), draft.region_count());
        let module_id = self
            .with_store(move |s| s.persist_module(test_case_id, &draft))
            .await?;

        Ok(FileOutcome::Ingested {
            module_id,
            partitions,
            blocks,
            regions,
        })
    }

    /// Run a blocking store operation off the async scheduler.
    async fn with_store<T, F>(&self, op: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&S) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| DatabaseError::BackgroundTask(e.to_string()))?
    }

    /// Discard the run's rows and hand the original error to the caller.
    async fn abort(&self, test_case_id: i64, cause: DatabaseError) -> IngestError {
        tracing::error!(test_case_id, error = %cause, "Aborting ingestion run");
        if let Err(e) = self.with_store(move |s| s.abort_run(test_case_id)).await {
            tracing::error!(test_case_id, error = %e, "Discarding run failed");
        }
        IngestError::Database(cause)
    }
}

/// Test case name: the directory's last path component.
fn run_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            std::fs::canonicalize(dir)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| dir.display().to_string())
}

/// All regular files under `root`, as (relative `/` path, absolute path),
/// sorted by relative path.
///
/// Only listing `root` itself may fail. Below it, unreadable directories
/// are logged and skipped, and directory symlinks are never followed.
fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>, IngestError> {
    let entries = std::fs::read_dir(root)?;
    let mut files = Vec::new();
    walk(root, entries, &mut files);
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn walk(root: &Path, entries: std::fs::ReadDir, files: &mut Vec<(String, PathBuf)>) {
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            tracing::warn!(path = %path.display(), "Skipping entry with unknown type");
            continue;
        };

        if file_type.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(children) => walk(root, children, files),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable directory")
                }
            }
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            files.push((relative_key(root, &path), path));
        } else {
            // Sockets, fifos, directory or dangling links.
            tracing::debug!(path = %path.display(), "Skipping non-regular entry");
        }
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
