//! The adapter contract shared by every backend CLI.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::adapter::{execute_with, ExecuteOptions};
use crate::config::AdapterConfig;
use crate::error::{AgentError, Capability, Result};
use crate::process::ProcessRunner;
use crate::stream::{EventRules, ExecutionResponse};

/// Feature flags an adapter variant declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub streaming: bool,
    pub session_management: bool,
    pub tool_calling: bool,
    pub multi_modal: bool,
}

impl Capabilities {
    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Streaming => self.streaming,
            Capability::SessionManagement => self.session_management,
            Capability::ToolCalling => self.tool_calling,
            Capability::MultiModal => self.multi_modal,
        }
    }
}

/// Translator between the normalized API and one agent CLI.
///
/// Implementors supply a pure argument builder and per-call event rules;
/// [`Adapter::execute`] wires them to the process runner and aggregator.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Short backend name, used in logs and errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Adapter-level defaults.
    fn config(&self) -> &AdapterConfig;

    fn runner(&self) -> &ProcessRunner;

    /// Executable used when the config does not override it.
    fn default_executable(&self) -> &'static str;

    /// Resolved executable path or name.
    fn executable(&self) -> &str {
        self.config()
            .cli_path
            .as_deref()
            .unwrap_or_else(|| self.default_executable())
    }

    /// Build the argument vector for one invocation.
    ///
    /// `session_id` selects a resumed conversation; `None` starts a new one.
    ///
    /// # Errors
    ///
    /// - `AgentError::Validation` for an empty prompt.
    /// - `AgentError::Capability` when the request needs an unsupported
    ///   feature (resume, image attachments).
    fn build_invocation_args(
        &self,
        prompt: &str,
        options: &ExecuteOptions,
        session_id: Option<&str>,
    ) -> Result<Vec<String>>;

    /// Extraction rules for one call.
    fn event_rules(&self, options: &ExecuteOptions) -> Box<dyn EventRules>;

    /// Fail fast unless `capability` is supported.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Capability` when unsupported.
    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities().supports(capability) {
            Ok(())
        } else {
            Err(AgentError::Capability {
                adapter: self.name(),
                capability,
            })
        }
    }

    /// Run one prompt to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool could not be run to completion; see
    /// [`AgentError`].
    async fn execute(&self, prompt: &str, options: ExecuteOptions) -> Result<ExecutionResponse> {
        execute_with(self, prompt, options).await
    }
}

impl std::fmt::Debug for dyn Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name())
            .field("executable", &self.executable())
            .finish_non_exhaustive()
    }
}

/// Checks shared by every argument builder.
pub(crate) fn check_request<A: Adapter + ?Sized>(
    adapter: &A,
    prompt: &str,
    options: &ExecuteOptions,
    session_id: Option<&str>,
) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(AgentError::Validation("prompt must not be empty".into()));
    }
    if session_id.is_some() {
        adapter.require(Capability::SessionManagement)?;
    }
    if !options.images.is_empty() {
        adapter.require(Capability::MultiModal)?;
    }
    Ok(())
}
