//! Normalized per-call execution options.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::process::ChunkCallback;
use crate::stream::{Event, JsonSchema, ResponseFormat};

/// Callback receiving parsed events while the process runs.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;

/// Backend-neutral approval/permission level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Backend default; prompts are answered by the backend's own policy.
    #[default]
    Default,
    /// Apply file edits without asking.
    AcceptEdits,
    /// Read-only planning.
    Plan,
    /// Skip every approval and sandbox check.
    Bypass,
}

/// Filesystem sandbox level for backends that enforce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

impl SandboxMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WorkspaceWrite => "workspace-write",
            Self::DangerFullAccess => "danger-full-access",
        }
    }
}

/// Options for one execution. Built once, never mutated by the SDK; merging
/// with adapter defaults produces a new value.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub(crate) model: Option<String>,
    pub(crate) cwd: Option<PathBuf>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) response_format: ResponseFormat,
    pub(crate) session_id: Option<String>,
    pub(crate) images: Vec<PathBuf>,
    pub(crate) permission_mode: Option<PermissionMode>,
    pub(crate) sandbox: Option<SandboxMode>,
    pub(crate) config_overrides: Vec<(String, String)>,
    pub(crate) output_file: Option<PathBuf>,
    pub(crate) allowed_tools: Vec<String>,
    pub(crate) max_turns: Option<u32>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) append_system_prompt: Option<String>,
    pub(crate) skip_git_repo_check: bool,
    pub(crate) log_dir: Option<PathBuf>,
    pub(crate) on_output: Option<ChunkCallback>,
    pub(crate) on_event: Option<EventCallback>,
    pub(crate) cancel: Option<CancellationToken>,
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("model", &self.model)
            .field("cwd", &self.cwd)
            .field("timeout", &self.timeout)
            .field("response_format", &self.response_format)
            .field("session_id", &self.session_id)
            .field("images", &self.images)
            .field("permission_mode", &self.permission_mode)
            .field("sandbox", &self.sandbox)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl ExecuteOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the working directory for the agent process.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add one environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Request structured JSON output, optionally validated against `schema`.
    #[must_use]
    pub fn json_output(mut self, schema: Option<JsonSchema>) -> Self {
        self.response_format = ResponseFormat::Json(schema);
        self
    }

    /// Resume an existing backend session.
    #[must_use]
    pub fn resume(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach an image file.
    #[must_use]
    pub fn image(mut self, path: impl Into<PathBuf>) -> Self {
        self.images.push(path.into());
        self
    }

    #[must_use]
    pub fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn sandbox(mut self, mode: SandboxMode) -> Self {
        self.sandbox = Some(mode);
        self
    }

    /// Add a `key=value` backend configuration override.
    #[must_use]
    pub fn config_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_overrides.push((key.into(), value.into()));
        self
    }

    /// Ask the backend to also write its final message to `path`.
    #[must_use]
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    /// Set the allowed tools.
    #[must_use]
    pub fn allowed_tools(mut self, tools: &[&str]) -> Self {
        self.allowed_tools = tools.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the maximum number of turns.
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        self.max_turns = Some(turns);
        self
    }

    /// Set a custom system prompt.
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Append to the system prompt.
    #[must_use]
    pub fn append_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.append_system_prompt = Some(prompt.into());
        self
    }

    #[must_use]
    pub fn skip_git_repo_check(mut self, skip: bool) -> Self {
        self.skip_git_repo_check = skip;
        self
    }

    /// Write each call's input and outcome under `dir`.
    #[must_use]
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Receive raw stdout chunks as they arrive.
    #[must_use]
    pub fn on_output<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_output = Some(Arc::new(callback));
        self
    }

    /// Receive parsed events as their lines complete.
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on_event = Some(Arc::new(callback));
        self
    }

    /// Cancelling `token` kills the agent process.
    #[must_use]
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    #[must_use]
    pub fn get_model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    #[must_use]
    pub fn get_session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn get_cwd(&self) -> Option<&PathBuf> {
        self.cwd.as_ref()
    }

    #[must_use]
    pub fn get_response_format(&self) -> &ResponseFormat {
        &self.response_format
    }
}
