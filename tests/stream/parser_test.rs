//! Tests for tolerant JSONL parsing.

use agent_cli_sdk::stream::LineBuffer;
use agent_cli_sdk::{Event, StreamEventParser};

fn types(events: &[Event]) -> Vec<&str> {
    events.iter().filter_map(Event::event_type).collect()
}

#[test]
fn invalid_lines_never_appear_and_order_is_kept() {
    let raw = concat!(
        "Loading agent...\n",
        "{\"type\":\"one\"}\n",
        "{\"type\":\"two\"\n",
        "[1, 2, 3]\n",
        "   \n",
        "\"just a string\"\n",
        "{\"type\":\"three\"}\n",
        "trailing banner"
    );
    let events = StreamEventParser::parse(raw);
    assert_eq!(types(&events), vec!["one", "three"]);
}

#[test]
fn parsing_is_idempotent() {
    let raw = "{\"type\":\"a\",\"n\":1}\nnoise\n{\"type\":\"b\",\"nested\":{\"k\":[1,2]}}\n";
    assert_eq!(StreamEventParser::parse(raw), StreamEventParser::parse(raw));
}

#[test]
fn crlf_and_surrounding_whitespace_are_tolerated() {
    let raw = "  {\"type\":\"a\"}  \r\n{\"type\":\"b\"}\r\n";
    assert_eq!(types(&StreamEventParser::parse(raw)), vec!["a", "b"]);
}

#[test]
fn zero_json_lines_parse_to_nothing() {
    assert!(StreamEventParser::parse("plain answer\nwith two lines").is_empty());
    assert!(StreamEventParser::parse("").is_empty());
}

#[test]
fn line_buffer_emits_only_completed_lines() {
    let mut buffer = LineBuffer::new();
    assert!(buffer.push("{\"type\":").is_empty());
    let events = buffer.push("\"a\"}\n{\"type\"");
    assert_eq!(types(&events), vec!["a"]);
    let events = buffer.push(":\"b\"}\n");
    assert_eq!(types(&events), vec!["b"]);
    assert!(buffer.finish().is_none());
}

#[test]
fn line_buffer_flushes_unterminated_tail() {
    let mut buffer = LineBuffer::new();
    assert!(buffer.push("{\"type\":\"tail\"}").is_empty());
    let tail = buffer.finish().unwrap();
    assert_eq!(tail.event_type(), Some("tail"));
}

#[test]
fn line_buffer_matches_batch_parse() {
    let raw = "{\"type\":\"a\"}\nnoise\n{\"type\":\"b\"}\n{\"type\":\"c\"}";
    let mut buffer = LineBuffer::new();
    let mut live = Vec::new();
    for chunk in raw.as_bytes().chunks(5) {
        live.extend(buffer.push(std::str::from_utf8(chunk).unwrap()));
    }
    live.extend(buffer.finish());
    assert_eq!(live, StreamEventParser::parse(raw));
}
