//! Tolerant JSONL parsing.
//!
//! Agent CLIs interleave banners, progress text and partial writes with their
//! JSON events, so a line that is not a JSON object is skipped, never an error.

use crate::stream::Event;

/// Parses newline-delimited JSON into ordered [`Event`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamEventParser;

impl StreamEventParser {
    /// Parse a single line. Blank lines and non-object JSON yield `None`.
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Event> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        match serde_json::from_str(trimmed) {
            Ok(value) => Event::from_value(value),
            Err(e) => {
                tracing::trace!(error = %e, line = trimmed, "Skipping non-JSON line");
                None
            }
        }
    }

    /// Parse a complete stdout capture, preserving arrival order.
    #[must_use]
    pub fn parse(raw: &str) -> Vec<Event> {
        raw.lines().filter_map(Self::parse_line).collect()
    }
}

/// Incremental splitter turning raw chunks into events as lines complete.
///
/// Used for live event delivery while the process is still running.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning events for every line it completes.
    pub fn push(&mut self, chunk: &str) -> Vec<Event> {
        self.partial.push_str(chunk);
        let Some(last_newline) = self.partial.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        StreamEventParser::parse(&complete)
    }

    /// Flush a trailing line that was never newline-terminated.
    pub fn finish(&mut self) -> Option<Event> {
        let line = std::mem::take(&mut self.partial);
        StreamEventParser::parse_line(&line)
    }
}
