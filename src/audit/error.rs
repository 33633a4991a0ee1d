//! Audit error types.

use std::path::PathBuf;

/// Errors that can occur while writing execution logs.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    /// Failed to create the log directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a log file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize a record to JSON.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
