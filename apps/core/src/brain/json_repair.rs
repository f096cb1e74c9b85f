//! Extraction of a JSON object from model output.
//!
//! Models asked for "only JSON" still wrap it in Markdown fences or add a
//! sentence before it. The text is trimmed, unfenced, and if needed reduced
//! to its first balanced `{ ... }` span before parsing.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::error::SchemaViolation;

// NOTE: expect() is acceptable here: the pattern is a compile-time constant.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("Invalid regex: code fence pattern")
});

/// Parses `raw` into a JSON object, repairing common wrapping first.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, SchemaViolation> {
    let trimmed = raw.trim();
    let unfenced = CODE_FENCE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    match serde_json::from_str::<Value>(unfenced) {
        Ok(Value::Object(map)) => return Ok(map),
        Ok(other) => {
            return Err(SchemaViolation::NotJson(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
        Err(_) => {}
    }

    let span = first_object_span(unfenced)
        .ok_or_else(|| SchemaViolation::NotJson("no JSON object found".to_string()))?;

    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SchemaViolation::NotJson(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(SchemaViolation::NotJson(e.to_string())),
    }
}

/// Finds the first balanced brace span, skipping braces inside strings.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
