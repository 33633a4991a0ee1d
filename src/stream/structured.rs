//! Structured-output extraction and schema validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error type for structured-output handling.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Nothing in the text parsed as JSON.
    #[error("no JSON value found in output")]
    NoJson,
    /// The schema document itself is unusable.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// The value does not satisfy the schema.
    #[error("schema violation at {path}: {message}")]
    Violation { path: String, message: String },
}

/// Requested shape of the response data.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    /// Return assembled text verbatim.
    #[default]
    Text,
    /// Extract a JSON value, optionally validating it.
    Json(Option<JsonSchema>),
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```[ \t]*(?:json|JSON)?[ \t]*\r?\n(.*?)```").ok())
        .as_ref()
}

/// Extract a JSON value from agent text.
///
/// Tries, in order: the whole trimmed text, each fenced code block, then the
/// outermost `{...}` or `[...]` span.
///
/// # Errors
///
/// Returns `SchemaError::NoJson` if none of these parse.
pub fn extract_json(text: &str) -> Result<Value, SchemaError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    if let Some(fence) = fence_regex() {
        for caps in fence.captures_iter(text) {
            if let Some(body) = caps.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                    return Ok(value);
                }
            }
        }
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    Err(SchemaError::NoJson)
}

/// A JSON Schema document.
///
/// Validation covers the keywords agents' structured output relies on:
/// `type`, `enum`, `const`, `properties`, `required`,
/// `additionalProperties`, `items`, `minItems` and `maxItems`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSchema(Value);

impl JsonSchema {
    #[must_use]
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Validate `value` against this schema.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, with a JSON-pointer path.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        validate_node(&self.0, value, "")
    }
}

fn violation(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::Violation {
        path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        message: message.into(),
    }
}

fn type_matches(expected: &str, value: &Value) -> Result<bool, SchemaError> {
    Ok(match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        other => return Err(SchemaError::InvalidSchema(format!("unknown type {other:?}"))),
    })
}

fn validate_node(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaError> {
    let schema = match schema {
        Value::Bool(true) => return Ok(()),
        Value::Bool(false) => return Err(violation(path, "no value is allowed here")),
        Value::Object(map) => map,
        _ => return Err(SchemaError::InvalidSchema("schema must be an object".into())),
    };

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => return Err(SchemaError::InvalidSchema("type must be a string or array".into())),
        };
        let mut matched = false;
        for ty in &allowed {
            if type_matches(ty, value)? {
                matched = true;
                break;
            }
        }
        if !matched {
            return Err(violation(path, format!("expected type {}", allowed.join(" or "))));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(value) {
            return Err(violation(path, "value is not one of the allowed options"));
        }
    }

    if let Some(expected) = schema.get("const") {
        if expected != value {
            return Err(violation(path, format!("expected constant {expected}")));
        }
    }

    if let Value::Object(obj) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if !obj.contains_key(key) {
                    return Err(violation(path, format!("missing required property {key:?}")));
                }
            }
        }

        let properties = schema.get("properties").and_then(Value::as_object);
        for (key, child) in obj {
            let child_path = format!("{path}/{key}");
            if let Some(prop_schema) = properties.and_then(|p| p.get(key)) {
                validate_node(prop_schema, child, &child_path)?;
                continue;
            }
            match schema.get("additionalProperties") {
                Some(Value::Bool(false)) => {
                    return Err(violation(path, format!("unexpected property {key:?}")));
                }
                Some(extra @ Value::Object(_)) => validate_node(extra, child, &child_path)?,
                _ => {}
            }
        }
    }

    if let Value::Array(items) = value {
        let len = items.len() as u64;
        if let Some(min) = schema.get("minItems").and_then(Value::as_u64) {
            if len < min {
                return Err(violation(path, format!("expected at least {min} items")));
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(Value::as_u64) {
            if len > max {
                return Err(violation(path, format!("expected at most {max} items")));
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                validate_node(item_schema, item, &format!("{path}/{i}"))?;
            }
        }
    }

    Ok(())
}
