//! Event types from `codex exec --json` output.

use serde::Deserialize;
use serde_json::Value;

/// Session id field names. `session_id` is the pre-thread naming.
pub const SESSION_ID_FIELDS: &[&str] = &["thread_id", "session_id"];

/// Token counters on `turn.completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CodexUsage {
    pub input_tokens: u64,
    pub cached_input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub message: Option<String>,
}

/// Top-level events emitted by `codex exec --json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum CodexEvent {
    #[serde(rename = "thread.started")]
    ThreadStarted,
    #[serde(rename = "turn.started")]
    TurnStarted,
    #[serde(rename = "turn.completed")]
    TurnCompleted {
        #[serde(default)]
        usage: Option<CodexUsage>,
    },
    #[serde(rename = "turn.failed")]
    TurnFailed {
        #[serde(default)]
        error: Option<ErrorBody>,
    },
    #[serde(rename = "item.started")]
    ItemStarted { item: Value },
    #[serde(rename = "item.updated")]
    ItemUpdated { item: Value },
    #[serde(rename = "item.completed")]
    ItemCompleted { item: Value },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    /// Session start in releases predating threads.
    #[serde(rename = "session.created")]
    SessionCreated,
    /// Legacy streamed text fragment.
    #[serde(rename = "message.chunk")]
    MessageChunk {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

/// One file touched by a `file_change` item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub kind: Option<String>,
}

/// The payload of an `item.*` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    AgentMessage {
        #[serde(default)]
        text: String,
    },
    Reasoning {
        #[serde(default)]
        text: String,
    },
    CommandExecution {
        #[serde(default)]
        command: String,
        #[serde(default)]
        exit_code: Option<i64>,
    },
    FileChange {
        #[serde(default)]
        changes: Vec<FileChange>,
    },
    McpToolCall {
        #[serde(default)]
        server: String,
        #[serde(default)]
        tool: String,
        #[serde(default)]
        arguments: Value,
    },
    WebSearch {
        #[serde(default)]
        query: String,
    },
    #[serde(other)]
    Other,
}

/// A decoded item with its identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CodexItem {
    pub id: Option<String>,
    pub kind: ItemKind,
}

impl CodexItem {
    /// Decode an item, accepting the older `item_type` tag and the
    /// `assistant_message` name for agent messages.
    #[must_use]
    pub fn from_value(item: &Value) -> Self {
        let id = item.get("id").and_then(Value::as_str).map(String::from);
        let mut normalized = item.clone();
        if let Value::Object(map) = &mut normalized {
            if !map.contains_key("type") {
                if let Some(tag) = map.remove("item_type") {
                    map.insert("type".to_string(), tag);
                }
            }
            if map.get("type").and_then(Value::as_str) == Some("assistant_message") {
                map.insert("type".to_string(), Value::from("agent_message"));
            }
        }
        let kind = serde_json::from_value(normalized).unwrap_or_else(|e| {
            tracing::trace!(error = %e, "Undecodable codex item");
            ItemKind::Other
        });
        Self { id, kind }
    }
}
