//! Event types from Gemini CLI `--output-format stream-json` output.

use serde::Deserialize;
use serde_json::Value;

/// Token statistics on the final `result` event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeminiStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    #[default]
    Error,
}

/// Events emitted by the Gemini CLI.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeminiEvent {
    Init {
        #[serde(default)]
        model: Option<String>,
    },
    Message {
        #[serde(default)]
        role: Role,
        #[serde(default)]
        content: String,
    },
    ToolUse {
        #[serde(default)]
        tool_name: String,
        #[serde(default)]
        tool_id: Option<String>,
        #[serde(default)]
        parameters: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_id: Option<String>,
        #[serde(default)]
        status: Option<String>,
    },
    Error {
        #[serde(default)]
        severity: Severity,
        #[serde(default)]
        message: String,
    },
    Result {
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        error: Option<Value>,
        #[serde(default)]
        stats: Option<GeminiStats>,
    },
    #[serde(other)]
    Unknown,
}
