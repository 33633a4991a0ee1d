//! Execution log writing JSON records with async file operations.

use std::path::{Path, PathBuf};

use chrono::Utc;
use uuid::Uuid;

use super::error::AuditError;
use super::types::{ErrorRecord, InputRecord, OutputRecord};
use crate::error::AgentError;
use crate::stream::ExecutionResponse;

const INPUT_FILE: &str = "input.json";
const OUTPUT_FILE: &str = "output.json";
const ERROR_FILE: &str = "error.json";

/// Returns the default base directory for execution logs.
///
/// This is `~/.local/share/agent-cli-sdk/logs` on Unix systems.
#[must_use]
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-cli-sdk")
        .join("logs")
}

/// Log for one execution, stored in its own run directory.
///
/// The `record_*` methods write in a detached task: a slow or failing log
/// destination never delays or fails the call being logged.
#[derive(Debug, Clone)]
pub struct ExecutionLog {
    run_dir: PathBuf,
}

impl ExecutionLog {
    /// Create a log whose run directory is a fresh subdirectory of `base`.
    #[must_use]
    pub fn new(base: impl AsRef<Path>) -> Self {
        let run_id = format!(
            "{}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            Uuid::new_v4().simple()
        );
        Self {
            run_dir: base.as_ref().join(run_id),
        }
    }

    /// Directory holding this run's files.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Write the input record.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn write_input(&self, record: &InputRecord) -> Result<(), AuditError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_file(INPUT_FILE, bytes).await
    }

    /// Write the response of a completed call.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn write_output(&self, response: &ExecutionResponse) -> Result<(), AuditError> {
        let bytes = output_bytes(response)?;
        self.write_file(OUTPUT_FILE, bytes).await
    }

    /// Write the error of a failed call.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn write_error(&self, record: &ErrorRecord) -> Result<(), AuditError> {
        let bytes = serde_json::to_vec_pretty(record)?;
        self.write_file(ERROR_FILE, bytes).await
    }

    /// Record the input in the background.
    pub fn record_input(&self, record: InputRecord) {
        self.spawn_write(INPUT_FILE, serde_json::to_vec_pretty(&record));
    }

    /// Record a response in the background.
    pub fn record_output(&self, response: &ExecutionResponse) {
        self.spawn_write(OUTPUT_FILE, output_bytes(response));
    }

    /// Record an error in the background.
    pub fn record_error(&self, err: &AgentError) {
        let record = ErrorRecord::from_error(err);
        self.spawn_write(ERROR_FILE, serde_json::to_vec_pretty(&record));
    }

    fn spawn_write(&self, name: &'static str, bytes: serde_json::Result<Vec<u8>>) {
        let bytes = match bytes {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(file = name, error = %e, "Failed to serialize execution log record");
                return;
            }
        };
        let log = self.clone();
        tokio::spawn(async move {
            if let Err(e) = log.write_file(name, bytes).await {
                tracing::warn!(error = %e, "Failed to write execution log");
            }
        });
    }

    async fn write_file(&self, name: &str, bytes: Vec<u8>) -> Result<(), AuditError> {
        tokio::fs::create_dir_all(&self.run_dir)
            .await
            .map_err(|source| AuditError::CreateDir {
                path: self.run_dir.clone(),
                source,
            })?;
        let path = self.run_dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| AuditError::Write { path, source })
    }
}

fn output_bytes(response: &ExecutionResponse) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(&OutputRecord {
        recorded_at: Utc::now(),
        response,
    })
}
