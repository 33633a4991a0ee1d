//! Error taxonomy for agent CLI execution.
//!
//! A returned `Err(AgentError)` means the tool could not be run to completion.
//! A tool that ran but reported failure produces an `Ok` response carrying an
//! in-band [`ResponseError`](crate::stream::ResponseError) instead.

use std::time::Duration;

use crate::config::ConfigError;
use crate::stream::SchemaError;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable was not found.
    #[error("executable not found: {0}")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The child exposed no readable stdio.
    #[error("process exposes no readable stdout/stderr")]
    NoStdio,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    pub(crate) fn from_io(executable: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(executable.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(executable.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Capabilities an adapter may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Streaming,
    SessionManagement,
    ToolCalling,
    MultiModal,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Streaming => "streaming",
            Self::SessionManagement => "session management",
            Self::ToolCalling => "tool calling",
            Self::MultiModal => "multi-modal input",
        };
        f.write_str(name)
    }
}

/// Errors surfaced as a failed call.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    /// The executable could not be started.
    #[error("failed to spawn process: {source}")]
    Spawn {
        #[source]
        source: SpawnError,
        /// Stderr captured before the failure, if any.
        stderr: String,
    },

    /// The deadline elapsed before the process exited.
    #[error("process timed out after {}ms", .timeout.as_millis())]
    Timeout { timeout: Duration },

    /// Abnormal termination with no more specific cause.
    #[error("process execution failed (exit code {exit_code:?}): {message}")]
    Execution {
        message: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Structured output could not be extracted or validated.
    #[error("failed to parse structured output: {reason}")]
    Parse { reason: String, text: String },

    /// Malformed caller input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Operation unsupported by the active adapter.
    #[error("{adapter} adapter does not support {capability}")]
    Capability {
        adapter: &'static str,
        capability: Capability,
    },

    /// The call was cancelled before the process exited.
    #[error("execution aborted")]
    Aborted,

    /// The session was aborted and accepts no more messages.
    #[error("session is closed")]
    SessionClosed,

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AgentError {
    /// Construct a parse error from a schema failure and the offending text.
    pub(crate) fn parse(err: &SchemaError, text: impl Into<String>) -> Self {
        Self::Parse {
            reason: err.to_string(),
            text: text.into(),
        }
    }

    /// Stderr captured by the failed process, when the error carries it.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Spawn { stderr, .. } | Self::Execution { stderr, .. } => {
                Some(stderr.as_str()).filter(|s| !s.is_empty())
            }
            _ => None,
        }
    }

    /// Whether this error means the deadline elapsed.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T, E = AgentError> = std::result::Result<T, E>;
