//! Event types from Claude Code stream-json output.
//!
//! Claude Code has changed its event vocabulary across releases; both the
//! current `assistant`/`result` shapes and the dotted legacy names
//! (`tool.started`, `message.chunk`, ...) are accepted.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::stream::ModelUsage;

/// Session id field names, current first.
pub const SESSION_ID_FIELDS: &[&str] = &["session_id", "sessionId"];

/// Token counters on the final result event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

/// Final result event data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResultEvent {
    /// Result subtype (e.g., "success", "`error_max_turns`").
    pub subtype: Option<String>,
    /// The canonical final answer.
    pub result: Option<String>,
    /// Whether an error occurred.
    pub is_error: bool,
    pub usage: Option<ResultUsage>,
    #[serde(rename = "modelUsage")]
    pub model_usage: BTreeMap<String, ModelUsage>,
    /// Total cost in USD.
    pub total_cost_usd: Option<f64>,
    /// Cost field used by older releases.
    pub cost_usd: Option<f64>,
}

impl ResultEvent {
    #[must_use]
    pub fn cost(&self) -> Option<f64> {
        self.total_cost_usd.or(self.cost_usd)
    }
}

/// Tool start data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolStarted {
    #[serde(alias = "toolName", alias = "tool")]
    pub name: String,
    #[serde(alias = "tool_use_id", alias = "toolUseId")]
    pub id: Option<String>,
    pub input: Value,
}

/// Events emitted by Claude Code in stream-json format.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeEvent {
    /// System initialization event.
    #[serde(rename = "system")]
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    /// Assistant message event.
    #[serde(rename = "assistant")]
    Assistant {
        /// Message content (flexible structure).
        #[serde(default)]
        message: Option<Value>,
        /// Top-level content used by some releases.
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        text: Option<String>,
    },
    /// Final result event.
    #[serde(rename = "result")]
    Result(ResultEvent),
    /// Tool use request.
    #[serde(rename = "tool.started", alias = "tool_use")]
    ToolStarted(ToolStarted),
    /// Tool execution result.
    #[serde(rename = "tool.completed", alias = "tool_result")]
    ToolCompleted {
        #[serde(default, alias = "toolName", alias = "tool")]
        name: Option<String>,
    },
    /// A file written by the agent.
    #[serde(rename = "file.modified")]
    FileModified {
        #[serde(alias = "filePath", alias = "file_path")]
        path: String,
    },
    /// Legacy streamed text fragment.
    #[serde(rename = "message.chunk")]
    MessageChunk {
        #[serde(default)]
        content: String,
    },
    /// Application-level failure.
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        error: Option<Value>,
    },
    /// Catch-all for unknown event types.
    #[serde(other)]
    Unknown,
}

impl ClaudeEvent {
    /// Returns true if this is a terminal event (Result).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns the tool name if this is a `ToolStarted` event.
    #[must_use]
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::ToolStarted(tool) => Some(&tool.name),
            _ => None,
        }
    }

    /// Human-readable message of an `Error` event.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let Self::Error { message, error } = self else {
            return None;
        };
        let from_error = error.as_ref().and_then(|e| match e {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(String::from),
            _ => None,
        });
        Some(
            message
                .clone()
                .or(from_error)
                .unwrap_or_else(|| "unknown error".to_string()),
        )
    }
}
