pub mod format;
pub mod parser;
pub mod decompose;
pub mod store;
pub mod orchestrator;

pub use format::*;
pub use parser::*;
pub use decompose::*;
pub use store::*;
pub use orchestrator::*;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::executor::ExecutorError;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("File is empty")]
    EmptyFile,

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),
}

/// Classification of a per-file failure, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EmptyFile,
    UnsupportedFormat,
    ParseError,
    SchemaError,
    IoError,
    StorageError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyFile => "empty_file",
            Self::UnsupportedFormat => "unsupported_format",
            Self::ParseError => "parse_error",
            Self::SchemaError => "schema_error",
            Self::IoError => "io_error",
            Self::StorageError => "storage_error",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngestError {
    /// Per-file classification. `NotADirectory` never reaches a file task;
    /// it maps to `IoError` only so the match stays total.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyFile => FailureKind::EmptyFile,
            Self::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            // A panicking parser is still a parse failure of that file.
            Self::Parse(_) | Self::Executor(_) => FailureKind::ParseError,
            Self::Schema(_) => FailureKind::SchemaError,
            Self::Io(_) | Self::NotADirectory(_) => FailureKind::IoError,
            Self::Database(_) => FailureKind::StorageError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_errors() {
        assert_eq!(IngestError::EmptyFile.kind(), FailureKind::EmptyFile);
        assert_eq!(
            IngestError::UnsupportedFormat("notes.txt".into()).kind(),
            FailureKind::UnsupportedFormat
        );
        assert_eq!(
            IngestError::Executor(ExecutorError::Panicked { label: "parse" }).kind(),
            FailureKind::ParseError
        );
        assert_eq!(
            IngestError::Database(DatabaseError::LockPoisoned).kind(),
            FailureKind::StorageError
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::UnsupportedFormat).unwrap();
        assert_eq!(json, "\"unsupported_format\"");
        assert_eq!(FailureKind::SchemaError.to_string(), "schema_error");
    }

    #[test]
    fn schema_error_message_names_field_and_entity() {
        let err = IngestError::from(SchemaError::MissingField {
            field: "vaddr",
            entity: "block 'b1'".into(),
        });
        assert_eq!(err.kind(), FailureKind::SchemaError);
        let message = err.to_string();
        assert!(message.contains("vaddr"));
        assert!(message.contains("block 'b1'"));
    }
}
