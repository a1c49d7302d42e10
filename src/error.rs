//! Error types for rust-medallion

use std::path::PathBuf;
use thiserror::Error;

use crate::model::Diagnostic;

/// Errors that can occur during model compilation
#[derive(Error, Debug)]
pub enum MedallionError {
    #[error("validation failed with {} error(s)", .diagnostics.iter().filter(|d| d.is_error()).count())]
    ValidationFailed { diagnostics: Vec<Diagnostic> },

    #[error("dependency cycle detected: [{}]", members.join(", "))]
    CycleDetected { members: Vec<String> },

    #[error("SQL generation error for model {model}: {message}")]
    GenerationError { model: String, message: String },

    #[error("unknown dialect: {name} (expected one of: postgres, spark)")]
    UnknownDialect { name: String },

    #[error("state snapshot already exists for environment {environment}: {path}")]
    SnapshotExists { environment: String, path: PathBuf },

    #[error("no state snapshot found for environment {environment}: {path}")]
    SnapshotMissing { environment: String, path: PathBuf },

    #[error("malformed state snapshot: {path}: {message}")]
    SnapshotMalformed { path: PathBuf, message: String },

    #[error("state snapshot is locked by another process: {path}")]
    SnapshotLocked { path: PathBuf },

    #[error("failed to write state snapshot: {path}")]
    SnapshotWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write artifact: {path}")]
    ArtifactWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

impl MedallionError {
    /// Process exit code for this error, per the CLI contract.
    ///
    /// 1 validation, 2 cycle, 3 snapshot conflict, 4 I/O, 5 unknown dialect.
    pub fn exit_code(&self) -> i32 {
        match self {
            MedallionError::ValidationFailed { .. } => 1,
            MedallionError::CycleDetected { .. } => 2,
            MedallionError::SnapshotExists { .. }
            | MedallionError::SnapshotMissing { .. }
            | MedallionError::SnapshotMalformed { .. }
            | MedallionError::SnapshotLocked { .. } => 3,
            MedallionError::GenerationError { .. }
            | MedallionError::SnapshotWriteError { .. }
            | MedallionError::ArtifactWriteError { .. }
            | MedallionError::IoError { .. } => 4,
            MedallionError::UnknownDialect { .. } => 5,
        }
    }
}

impl From<std::io::Error> for MedallionError {
    fn from(err: std::io::Error) -> Self {
        MedallionError::IoError {
            message: err.to_string(),
        }
    }
}
