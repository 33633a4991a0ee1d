//! Codex CLI adapter.
//!
//! Resumes with the positional `resume <id>` subcommand. The canonical
//! output is the last `agent_message` item reported by `item.completed`.

mod events;

pub use events::*;

use serde_json::{json, Value};

use crate::adapter::{
    check_request, Adapter, Capabilities, ExecuteOptions, PermissionMode, SandboxMode,
};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::process::ProcessRunner;
use crate::stream::{ErrorCode, Event, EventRules, ModelUsage, OutputRule, Signal, TokenUsage};

/// Adapter for the `codex` CLI.
#[derive(Debug, Default)]
pub struct CodexAdapter {
    config: AdapterConfig,
    runner: ProcessRunner,
}

impl CodexAdapter {
    #[must_use]
    pub fn new(config: AdapterConfig) -> Self {
        Self {
            config,
            runner: ProcessRunner::new(),
        }
    }

    /// Use a custom process runner.
    #[must_use]
    pub fn with_runner(mut self, runner: ProcessRunner) -> Self {
        self.runner = runner;
        self
    }
}

impl Adapter for CodexAdapter {
    fn name(&self) -> &'static str {
        "codex"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            session_management: true,
            tool_calling: true,
            multi_modal: true,
        }
    }

    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    fn default_executable(&self) -> &'static str {
        "codex"
    }

    fn build_invocation_args(
        &self,
        prompt: &str,
        options: &ExecuteOptions,
        session_id: Option<&str>,
    ) -> Result<Vec<String>> {
        check_request(self, prompt, options, session_id)?;

        let mut args = vec!["exec".to_string(), "--json".to_string()];

        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        // Plan mode maps onto the read-only sandbox unless one is given.
        let plan = options.permission_mode == Some(PermissionMode::Plan);
        let sandbox = options
            .sandbox
            .map(SandboxMode::as_str)
            .or(plan.then_some("read-only"));
        if let Some(sandbox) = sandbox {
            args.push("--sandbox".to_string());
            args.push(sandbox.to_string());
        }

        if let Some(dir) = &options.cwd {
            args.push("--cd".to_string());
            args.push(dir.display().to_string());
        }

        for image in &options.images {
            args.push("--image".to_string());
            args.push(image.display().to_string());
        }

        for (key, value) in &options.config_overrides {
            args.push("-c".to_string());
            args.push(format!("{key}={value}"));
        }

        if let Some(path) = &options.output_file {
            args.push("--output-last-message".to_string());
            args.push(path.display().to_string());
        }

        if options.skip_git_repo_check {
            args.push("--skip-git-repo-check".to_string());
        }

        match options.permission_mode {
            Some(PermissionMode::AcceptEdits) => args.push("--full-auto".to_string()),
            Some(PermissionMode::Bypass) => {
                args.push("--dangerously-bypass-approvals-and-sandbox".to_string());
            }
            Some(PermissionMode::Default | PermissionMode::Plan) | None => {}
        }

        if !options.allowed_tools.is_empty()
            || options.max_turns.is_some()
            || options.system_prompt.is_some()
            || options.append_system_prompt.is_some()
        {
            tracing::warn!("codex adapter ignores allowed tools, max turns and system prompts");
        }

        if let Some(id) = session_id {
            args.push("resume".to_string());
            args.push(id.to_string());
        }

        args.push(prompt.to_string());
        Ok(args)
    }

    fn event_rules(&self, options: &ExecuteOptions) -> Box<dyn EventRules> {
        Box::new(CodexRules {
            model: options.model.clone(),
        })
    }
}

/// Extraction rules for Codex streams.
///
/// Codex reports usage without naming the model, so per-model usage is
/// attributed to the model the call selected, when known.
#[derive(Debug, Clone, Default)]
pub struct CodexRules {
    pub model: Option<String>,
}

impl CodexRules {
    fn decode(event: &Event) -> CodexEvent {
        event.decode().unwrap_or_else(|e| {
            tracing::trace!(error = %e, event_type = ?event.event_type(), "Undecodable codex event");
            CodexEvent::Unknown
        })
    }

    fn completed_item(item: &Value, signals: &mut Vec<Signal>) {
        let CodexItem { id, kind } = CodexItem::from_value(item);
        match kind {
            ItemKind::AgentMessage { text } => signals.push(Signal::Canonical(text)),
            ItemKind::CommandExecution { command, exit_code } => signals.push(Signal::Tool {
                name: "command".to_string(),
                id,
                input: json!({ "command": command, "exit_code": exit_code }),
            }),
            ItemKind::FileChange { changes } => {
                for change in &changes {
                    signals.push(Signal::FileModified(change.path.clone()));
                }
                let paths: Vec<&str> = changes.iter().map(|c| c.path.as_str()).collect();
                signals.push(Signal::Tool {
                    name: "apply_patch".to_string(),
                    id,
                    input: json!({ "paths": paths }),
                });
            }
            ItemKind::McpToolCall {
                server,
                tool,
                arguments,
            } => signals.push(Signal::Tool {
                name: format!("{server}.{tool}"),
                id,
                input: arguments,
            }),
            ItemKind::WebSearch { query } => signals.push(Signal::Tool {
                name: "web_search".to_string(),
                id,
                input: json!({ "query": query }),
            }),
            ItemKind::Reasoning { .. } | ItemKind::Other => {}
        }
    }
}

impl EventRules for CodexRules {
    fn signals(&self, event: &Event) -> Vec<Signal> {
        let mut signals = Vec::new();
        if let Some(id) = event.first_str(SESSION_ID_FIELDS) {
            signals.push(Signal::SessionId(id.to_string()));
        }

        match Self::decode(event) {
            CodexEvent::ItemCompleted { item } => Self::completed_item(&item, &mut signals),
            CodexEvent::TurnCompleted { usage: Some(usage) } => {
                signals.push(Signal::Usage(TokenUsage::new(
                    usage.input_tokens,
                    usage.output_tokens,
                )));
                if let Some(model) = &self.model {
                    signals.push(Signal::ModelUsage {
                        model: model.clone(),
                        usage: ModelUsage {
                            input_tokens: usage.input_tokens,
                            output_tokens: usage.output_tokens,
                            cache_read_input_tokens: usage.cached_input_tokens,
                            ..ModelUsage::default()
                        },
                    });
                }
            }
            CodexEvent::TurnFailed { error } => signals.push(Signal::Error {
                code: ErrorCode::TurnFailed,
                message: error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| "turn failed".to_string()),
                details: Some(event.as_value().clone()),
            }),
            CodexEvent::Error { message } => signals.push(Signal::Error {
                code: ErrorCode::EventError,
                message: message.unwrap_or_else(|| "unknown error".to_string()),
                details: Some(event.as_value().clone()),
            }),
            CodexEvent::MessageChunk { content } => signals.push(Signal::Text(content)),
            CodexEvent::ThreadStarted
            | CodexEvent::TurnStarted
            | CodexEvent::TurnCompleted { usage: None }
            | CodexEvent::ItemStarted { .. }
            | CodexEvent::ItemUpdated { .. }
            | CodexEvent::SessionCreated
            | CodexEvent::Unknown => {}
        }
        signals
    }

    fn output_rule(&self) -> OutputRule {
        OutputRule::CanonicalOverStreamed
    }
}
