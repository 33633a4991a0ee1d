//! Colored terminal output for the `agent-cli` binary.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use agent_cli_sdk::stream::Signal;
use agent_cli_sdk::ExecutionResponse;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to at most `max_len` characters, adding an ellipsis if
/// truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Format tool input for display, truncating long values.
#[must_use]
pub fn format_tool_input(input: &serde_json::Value) -> String {
    match input {
        serde_json::Value::Object(map) => {
            let pairs: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let value_str = match v {
                        serde_json::Value::String(s) => truncate(s, 50),
                        other => truncate(&other.to_string(), 50),
                    };
                    format!("{k}={value_str}")
                })
                .collect();
            pairs.join(", ")
        }
        other => truncate(&other.to_string(), DEFAULT_MAX_LEN),
    }
}

/// Print the backend and, once known, the session id.
pub fn print_session_start(backend: &str, session_id: Option<&str>) {
    println!(
        "{} {} backend={}, session={}",
        timestamp().dimmed(),
        "[SESSION]".blue().bold(),
        backend.cyan(),
        truncate(session_id.unwrap_or("new"), 36).dimmed()
    );
    let _ = io::stdout().flush();
}

/// Print one live signal. Returns true if it printed response text.
pub fn print_signal(signal: &Signal) -> bool {
    let printed_text = match signal {
        Signal::Text(text) => {
            print!("{text}");
            true
        }
        Signal::Tool { name, input, .. } => {
            println!(
                "\n{} {} ({})",
                "[TOOL]".cyan().bold(),
                name.bold(),
                format_tool_input(input).dimmed()
            );
            false
        }
        Signal::FileModified(path) => {
            println!("{} {}", "[FILE]".green().bold(), path);
            false
        }
        Signal::Error { message, .. } => {
            print_error(message);
            false
        }
        _ => false,
    };
    let _ = io::stdout().flush();
    printed_text
}

/// Print a raw stdout chunk.
pub fn print_raw(chunk: &str) {
    print!("{}", chunk.dimmed());
    let _ = io::stdout().flush();
}

/// Print the closing summary of a response.
pub fn print_summary(response: &ExecutionResponse) {
    let ts = timestamp();
    let session = response
        .session_id
        .as_deref()
        .map_or(String::new(), |id| format!("session_id={}", truncate(id, 36)));
    let cost = response
        .metadata
        .cost_usd
        .map_or(String::new(), |c| format!(", cost: ${c:.4}"));
    let label = if response.is_success() {
        "[DONE]".blue().bold().to_string()
    } else {
        "[FAILED]".red().bold().to_string()
    };
    println!(
        "\n{} {} {}ms, {} tokens{} {}",
        ts.dimmed(),
        label,
        response.duration.as_millis(),
        response.usage.total_tokens,
        cost,
        session.dimmed()
    );
    if !response.metadata.tools_used.is_empty() {
        println!(
            "{} {}",
            "[TOOLS]".cyan().bold(),
            response.metadata.tools_used.join(", ")
        );
    }
    if let Some(error) = &response.error {
        println!(
            "{} {} {}",
            "[ERROR]".red().bold(),
            error.code.as_str().red(),
            truncate(&error.message, 200)
        );
    }
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
}
