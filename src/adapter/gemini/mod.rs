//! Gemini CLI adapter.
//!
//! Gemini has no resumable sessions and no canonical terminal message: the
//! output is the concatenation of streamed assistant messages.

mod events;

pub use events::*;

use serde_json::Value;

use crate::adapter::{check_request, Adapter, Capabilities, ExecuteOptions, PermissionMode};
use crate::config::AdapterConfig;
use crate::error::Result;
use crate::process::ProcessRunner;
use crate::stream::{ErrorCode, Event, EventRules, ModelUsage, OutputRule, Signal, TokenUsage};

const FILE_WRITING_TOOLS: &[&str] = &["write_file", "replace"];

/// Adapter for the `gemini` CLI.
#[derive(Debug, Default)]
pub struct GeminiAdapter {
    config: AdapterConfig,
    runner: ProcessRunner,
}

impl GeminiAdapter {
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

impl Adapter for GeminiAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming: true,
            session_management: false,
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
        "gemini"
    }

    fn build_invocation_args(
        &self,
        prompt: &str,
        options: &ExecuteOptions,
        session_id: Option<&str>,
    ) -> Result<Vec<String>> {
        check_request(self, prompt, options, session_id)?;

        let mut args = vec!["--output-format".to_string(), "stream-json".to_string()];

        if let Some(model) = &options.model {
            args.push("-m".to_string());
            args.push(model.clone());
        }

        match options.permission_mode {
            Some(PermissionMode::AcceptEdits) => {
                args.push("--approval-mode".to_string());
                args.push("auto_edit".to_string());
            }
            Some(PermissionMode::Bypass) => args.push("--yolo".to_string()),
            Some(PermissionMode::Default | PermissionMode::Plan) | None => {}
        }

        args.push("-p".to_string());
        args.push(prompt.to_string());
        Ok(args)
    }

    fn event_rules(&self, options: &ExecuteOptions) -> Box<dyn EventRules> {
        Box::new(GeminiRules {
            model: options.model.clone(),
        })
    }
}

/// Extraction rules for Gemini streams.
#[derive(Debug, Clone, Default)]
pub struct GeminiRules {
    pub model: Option<String>,
}

impl EventRules for GeminiRules {
    fn signals(&self, event: &Event) -> Vec<Signal> {
        let mut signals = Vec::new();
        if let Some(id) = event.first_str(&["session_id"]) {
            signals.push(Signal::SessionId(id.to_string()));
        }

        let decoded = event.decode().unwrap_or_else(|e| {
            tracing::trace!(error = %e, event_type = ?event.event_type(), "Undecodable gemini event");
            GeminiEvent::Unknown
        });
        match decoded {
            GeminiEvent::Message {
                role: Role::Assistant,
                content,
            } => signals.push(Signal::Text(content)),
            GeminiEvent::ToolUse {
                tool_name,
                tool_id,
                parameters,
            } => {
                if FILE_WRITING_TOOLS.contains(&tool_name.as_str()) {
                    if let Some(path) = parameters.get("file_path").and_then(Value::as_str) {
                        signals.push(Signal::FileModified(path.to_string()));
                    }
                }
                if !tool_name.is_empty() {
                    signals.push(Signal::Tool {
                        name: tool_name,
                        id: tool_id,
                        input: parameters,
                    });
                }
            }
            GeminiEvent::Error {
                severity: Severity::Error,
                message,
            } => signals.push(Signal::Error {
                code: ErrorCode::EventError,
                message,
                details: Some(event.as_value().clone()),
            }),
            GeminiEvent::Result {
                status,
                error,
                stats,
            } => {
                if let Some(stats) = stats {
                    signals.push(Signal::Usage(TokenUsage::new(
                        stats.input_tokens,
                        stats.output_tokens,
                    )));
                    if let Some(model) = &self.model {
                        signals.push(Signal::ModelUsage {
                            model: model.clone(),
                            usage: ModelUsage {
                                input_tokens: stats.input_tokens,
                                output_tokens: stats.output_tokens,
                                ..ModelUsage::default()
                            },
                        });
                    }
                }
                if status.as_deref() == Some("error") {
                    let message = error
                        .as_ref()
                        .and_then(|e| e.get("message"))
                        .and_then(Value::as_str)
                        .unwrap_or("gemini reported an error")
                        .to_string();
                    signals.push(Signal::Error {
                        code: ErrorCode::EventError,
                        message,
                        details: error,
                    });
                }
            }
            GeminiEvent::Init { .. }
            | GeminiEvent::Message {
                role: Role::User, ..
            }
            | GeminiEvent::ToolResult { .. }
            | GeminiEvent::Error {
                severity: Severity::Warning,
                ..
            }
            | GeminiEvent::Unknown => {}
        }
        signals
    }

    fn output_rule(&self) -> OutputRule {
        OutputRule::StreamedOnly
    }
}
