//! Single-pass reduction of an event stream into an [`ExecutionResponse`].
//!
//! Backends disagree on nearly everything: where the session id lives, which
//! event carries the final answer, how usage is reported. Each adapter
//! implements [`EventRules`] to translate its own events into backend-neutral
//! [`Signal`]s, and declares an [`OutputRule`] saying how canonical text and
//! streamed text combine. The aggregator only ever sees signals.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::process::ProcessOutput;
use crate::stream::{
    extract_json, ErrorCode, Event, ExecutionResponse, ModelUsage, RawOutput, ResponseData,
    ResponseError, ResponseFormat, ResponseMetadata, ResponseStatus, TokenUsage, ToolAction,
};

/// Backend-neutral facts extracted from one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// A backend-issued session identifier. Later values replace earlier ones.
    SessionId(String),
    /// Incrementally streamed text, concatenated in arrival order.
    Text(String),
    /// Text from the backend's canonical output event.
    Canonical(String),
    /// A tool invocation.
    Tool {
        name: String,
        id: Option<String>,
        input: Value,
    },
    /// A file path the agent modified.
    FileModified(String),
    /// Aggregate token usage to add.
    Usage(TokenUsage),
    /// Per-model usage to add.
    ModelUsage { model: String, usage: ModelUsage },
    /// Total cost reported by the backend, in USD.
    Cost(f64),
    /// An application-level failure reported in-stream.
    Error {
        code: ErrorCode,
        message: String,
        details: Option<Value>,
    },
}

/// How canonical output and streamed text combine into the response data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRule {
    /// The last canonical text, when any canonical event arrived, replaces
    /// all streamed text. Otherwise streamed text is used.
    CanonicalOverStreamed,
    /// The backend has no canonical event; streamed text is the output.
    StreamedOnly,
}

/// Backend-specific extraction rules consumed by [`ResponseAggregator`].
pub trait EventRules: Send + Sync {
    /// Translate one event into signals, in the order they should apply.
    fn signals(&self, event: &Event) -> Vec<Signal>;

    /// The output precedence rule for this backend.
    fn output_rule(&self) -> OutputRule;
}

#[derive(Debug, Default)]
struct Accumulator {
    session_id: Option<String>,
    streamed: String,
    canonical: Option<String>,
    tools_seen: HashSet<String>,
    tools_used: Vec<String>,
    files_seen: HashSet<String>,
    files_modified: Vec<String>,
    actions: Vec<ToolAction>,
    usage: TokenUsage,
    model_usage: BTreeMap<String, ModelUsage>,
    cost_usd: Option<f64>,
    error: Option<ResponseError>,
}

impl Accumulator {
    fn apply(&mut self, signal: Signal) {
        match signal {
            Signal::SessionId(id) => {
                if !id.is_empty() {
                    self.session_id = Some(id);
                }
            }
            Signal::Text(text) => self.streamed.push_str(&text),
            Signal::Canonical(text) => self.canonical = Some(text),
            Signal::Tool { name, id, input } => {
                if self.tools_seen.insert(name.clone()) {
                    self.tools_used.push(name.clone());
                }
                self.actions.push(ToolAction {
                    tool: name,
                    id,
                    input,
                });
            }
            Signal::FileModified(path) => {
                if self.files_seen.insert(path.clone()) {
                    self.files_modified.push(path);
                }
            }
            Signal::Usage(usage) => self.usage.add(&usage),
            Signal::ModelUsage { model, usage } => {
                self.model_usage.entry(model).or_default().add(&usage);
            }
            Signal::Cost(cost) => {
                *self.cost_usd.get_or_insert(0.0) += cost;
            }
            Signal::Error {
                code,
                message,
                details,
            } => {
                // The first reported failure is the cause; later ones cascade.
                if self.error.is_none() {
                    self.error = Some(ResponseError {
                        code,
                        message,
                        details,
                    });
                }
            }
        }
    }
}

/// Reduces parsed events and process output into one response.
pub struct ResponseAggregator<'a> {
    rules: &'a dyn EventRules,
}

impl<'a> ResponseAggregator<'a> {
    #[must_use]
    pub fn new(rules: &'a dyn EventRules) -> Self {
        Self { rules }
    }

    /// Walk `events` once and build the response.
    ///
    /// With zero events the raw stdout is the text output. When structured
    /// output is requested and the run succeeded, the JSON value is
    /// extracted from the assembled text and validated.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Parse` if structured extraction or validation
    /// fails, carrying the offending text.
    pub fn aggregate(
        &self,
        events: Vec<Event>,
        output: ProcessOutput,
        format: &ResponseFormat,
    ) -> Result<ExecutionResponse> {
        let mut acc = Accumulator::default();
        for event in &events {
            for signal in self.rules.signals(event) {
                acc.apply(signal);
            }
        }

        let text = if events.is_empty() {
            output.stdout.clone()
        } else {
            match self.rules.output_rule() {
                OutputRule::CanonicalOverStreamed => acc.canonical.take().unwrap_or(acc.streamed),
                OutputRule::StreamedOnly => acc.streamed,
            }
        };

        let error = acc.error.or_else(|| exit_error(&output, &text));
        let status = if error.is_some() {
            ResponseStatus::Error
        } else {
            ResponseStatus::Success
        };

        let data = match format {
            ResponseFormat::Json(schema) if status == ResponseStatus::Success => {
                let value = extract_json(&text).map_err(|e| AgentError::parse(&e, text.clone()))?;
                if let Some(schema) = schema {
                    schema
                        .validate(&value)
                        .map_err(|e| AgentError::parse(&e, text.clone()))?;
                }
                ResponseData::Json(value)
            }
            _ => ResponseData::Text(text),
        };

        if let Some(ref id) = acc.session_id {
            tracing::debug!(session_id = %id, "Resolved session id");
        }

        Ok(ExecutionResponse {
            data,
            events,
            session_id: acc.session_id,
            status,
            exit_code: output.exit_code,
            duration: output.duration,
            actions: acc.actions,
            metadata: ResponseMetadata {
                tools_used: acc.tools_used,
                files_modified: acc.files_modified,
                tokens_used: acc.usage.total_tokens,
                cost_usd: acc.cost_usd,
            },
            usage: acc.usage,
            model_usage: acc.model_usage,
            raw: RawOutput {
                stdout: output.stdout,
                stderr: output.stderr,
            },
            error,
        })
    }
}

fn exit_error(output: &ProcessOutput, text: &str) -> Option<ResponseError> {
    if output.exit_code == 0 {
        return None;
    }
    let details = (!output.stderr.is_empty()).then(|| Value::String(output.stderr.clone()));
    if text.trim().is_empty() {
        Some(ResponseError {
            code: ErrorCode::NoOutput,
            message: format!(
                "process exited with code {} and produced no output",
                output.exit_code
            ),
            details,
        })
    } else {
        Some(ResponseError {
            code: ErrorCode::NonZeroExit,
            message: format!("process exited with code {}", output.exit_code),
            details,
        })
    }
}
