//! Records written by the execution log.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::stream::ExecutionResponse;

/// What was asked of the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub adapter: String,
    pub executable: String,
    pub args: Vec<String>,
    pub prompt: String,
    pub cwd: Option<PathBuf>,
    pub model: Option<String>,
    pub session_id: Option<String>,
}

/// A completed call.
#[derive(Debug, Clone, Serialize)]
pub struct OutputRecord<'a> {
    pub recorded_at: DateTime<Utc>,
    pub response: &'a ExecutionResponse,
}

/// A call that failed to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub recorded_at: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub stderr: Option<String>,
}

impl ErrorRecord {
    #[must_use]
    pub fn from_error(err: &AgentError) -> Self {
        let kind = match err {
            AgentError::Spawn { .. } => "spawn",
            AgentError::Timeout { .. } => "timeout",
            AgentError::Execution { .. } => "execution",
            AgentError::Parse { .. } => "parse",
            AgentError::Validation(_) => "validation",
            AgentError::Capability { .. } => "capability",
            AgentError::Aborted => "aborted",
            AgentError::SessionClosed => "session_closed",
            AgentError::Config(_) => "config",
        };
        Self {
            recorded_at: Utc::now(),
            kind: kind.to_string(),
            message: err.to_string(),
            stderr: err.stderr().map(str::to_string),
        }
    }
}
