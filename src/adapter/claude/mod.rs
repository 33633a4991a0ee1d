//! Claude Code adapter.
//!
//! Resumes with `--resume <id>`. The terminal `result` event is canonical:
//! its text replaces whatever the assistant streamed before it.

mod events;

pub use events::*;

use serde_json::Value;

use crate::adapter::{check_request, Adapter, Capabilities, ExecuteOptions, PermissionMode};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::process::ProcessRunner;
use crate::stream::{ErrorCode, Event, EventRules, OutputRule, Signal, TokenUsage};

/// Tools whose input names a file they write.
const FILE_WRITING_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit", "NotebookEdit"];

/// Adapter for the `claude` CLI.
#[derive(Debug, Default)]
pub struct ClaudeAdapter {
    config: AdapterConfig,
    runner: ProcessRunner,
}

impl ClaudeAdapter {
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

impl Adapter for ClaudeAdapter {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            session_management: true,
            tool_calling: true,
            multi_modal: false,
        }
    }

    fn config(&self) -> &AdapterConfig {
        &self.config
    }

    fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    fn default_executable(&self) -> &'static str {
        "claude"
    }

    fn build_invocation_args(
        &self,
        prompt: &str,
        options: &ExecuteOptions,
        session_id: Option<&str>,
    ) -> Result<Vec<String>> {
        check_request(self, prompt, options, session_id)?;

        let mut args = vec![
            "-p".to_string(),
            prompt.to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
        ];

        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }

        if let Some(id) = session_id {
            args.push("--resume".to_string());
            args.push(id.to_string());
        }

        if let Some(mode) = options.permission_mode {
            args.push("--permission-mode".to_string());
            args.push(permission_mode_arg(mode).to_string());
        }

        if !options.allowed_tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(options.allowed_tools.join(","));
        }

        if let Some(turns) = options.max_turns {
            args.push("--max-turns".to_string());
            args.push(turns.to_string());
        }

        if let Some(prompt) = &options.append_system_prompt {
            args.push("--append-system-prompt".to_string());
            args.push(prompt.clone());
        }

        if let Some(prompt) = &options.system_prompt {
            args.push("--system-prompt".to_string());
            args.push(prompt.clone());
        }

        if options.sandbox.is_some()
            || !options.config_overrides.is_empty()
            || options.output_file.is_some()
        {
            tracing::warn!("claude adapter ignores sandbox, config overrides and output file");
        }

        Ok(args)
    }

    fn event_rules(&self, _options: &ExecuteOptions) -> Box<dyn EventRules> {
        Box::new(ClaudeRules)
    }
}

fn permission_mode_arg(mode: PermissionMode) -> &'static str {
    match mode {
        PermissionMode::Default => "default",
        PermissionMode::AcceptEdits => "acceptEdits",
        PermissionMode::Plan => "plan",
        PermissionMode::Bypass => "bypassPermissions",
    }
}

/// Extraction rules for Claude Code streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaudeRules;

impl ClaudeRules {
    fn decode(event: &Event) -> ClaudeEvent {
        event.decode().unwrap_or_else(|e| {
            tracing::trace!(error = %e, event_type = ?event.event_type(), "Undecodable claude event");
            ClaudeEvent::Unknown
        })
    }
}

impl EventRules for ClaudeRules {
    fn signals(&self, event: &Event) -> Vec<Signal> {
        let mut signals = Vec::new();
        if let Some(id) = event.first_str(SESSION_ID_FIELDS) {
            signals.push(Signal::SessionId(id.to_string()));
        }

        match Self::decode(event) {
            ClaudeEvent::Assistant {
                message,
                content,
                text,
            } => {
                let body = message
                    .as_ref()
                    .map(|m| m.get("content").unwrap_or(m))
                    .or(content.as_ref());
                if let Some(body) = body {
                    content_signals(body, &mut signals);
                } else if let Some(text) = text {
                    signals.push(Signal::Text(text));
                }
            }
            ClaudeEvent::MessageChunk { content } => signals.push(Signal::Text(content)),
            ClaudeEvent::ToolStarted(tool) => tool_signals(tool.name, tool.id, tool.input, &mut signals),
            ClaudeEvent::FileModified { path } => signals.push(Signal::FileModified(path)),
            ClaudeEvent::Result(result) => {
                // Per-assistant usage repeats across turns; only the result
                // event carries the session total.
                if let Some(usage) = result.usage {
                    signals.push(Signal::Usage(TokenUsage::new(
                        usage.input_tokens,
                        usage.output_tokens,
                    )));
                }
                if let Some(cost) = result.cost() {
                    signals.push(Signal::Cost(cost));
                }
                for (model, usage) in &result.model_usage {
                    signals.push(Signal::ModelUsage {
                        model: model.clone(),
                        usage: *usage,
                    });
                }
                if result.is_error {
                    signals.push(Signal::Error {
                        code: ErrorCode::EventError,
                        message: result
                            .result
                            .clone()
                            .or_else(|| result.subtype.clone())
                            .unwrap_or_else(|| "claude reported an error".to_string()),
                        details: Some(event.as_value().clone()),
                    });
                }
                if let Some(text) = result.result {
                    signals.push(Signal::Canonical(text));
                }
            }
            ref error @ ClaudeEvent::Error { .. } => signals.push(Signal::Error {
                code: ErrorCode::EventError,
                message: error.error_message().unwrap_or_default(),
                details: Some(event.as_value().clone()),
            }),
            ClaudeEvent::System { .. } | ClaudeEvent::ToolCompleted { .. } | ClaudeEvent::Unknown => {}
        }
        signals
    }

    fn output_rule(&self) -> OutputRule {
        OutputRule::CanonicalOverStreamed
    }
}

/// Signals from message content: a plain string or a list of blocks.
fn content_signals(content: &Value, signals: &mut Vec<Signal>) {
    match content {
        Value::String(text) => signals.push(Signal::Text(text.clone())),
        Value::Array(blocks) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = block.get("text").and_then(Value::as_str) {
                            signals.push(Signal::Text(text.to_string()));
                        }
                    }
                    Some("tool_use") => {
                        let name = block.get("name").and_then(Value::as_str).unwrap_or_default();
                        let id = block.get("id").and_then(Value::as_str).map(String::from);
                        let input = block.get("input").cloned().unwrap_or(Value::Null);
                        tool_signals(name.to_string(), id, input, signals);
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn tool_signals(name: String, id: Option<String>, input: Value, signals: &mut Vec<Signal>) {
    if name.is_empty() {
        return;
    }
    if FILE_WRITING_TOOLS.contains(&name.as_str()) {
        if let Some(path) = input
            .get("file_path")
            .or_else(|| input.get("notebook_path"))
            .and_then(Value::as_str)
        {
            signals.push(Signal::FileModified(path.to_string()));
        }
    }
    signals.push(Signal::Tool { name, id, input });
}
