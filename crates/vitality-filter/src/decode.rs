//! Expansion of JSON-encoded string values.

use serde_json::{Map, Value};

use crate::error::FilterError;

/// Parses `text` when it holds a JSON object or array.
///
/// Scalars are not interesting here: a string that parses to a number or a
/// bool stays a string.
pub fn try_parse_json(text: &str) -> Option<Value> {
    let trimmed = text.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(text).ok()
}

/// Returns a copy of `record` in which every string holding a JSON object
/// or array has been replaced by the parsed structure, recursively.
pub fn decode(record: &Value) -> Result<Map<String, Value>, FilterError> {
    match record {
        Value::Object(map) => Ok(decode_map(map.clone())),
        other => Err(FilterError::NotAMap {
            found: kind_of(other),
        }),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn decode_map(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| (key, decode_value(value)))
        .collect()
}

fn decode_value(value: Value) -> Value {
    match value {
        Value::String(text) => match try_parse_json(&text) {
            Some(Value::Object(inner)) => Value::Object(decode_map(inner)),
            Some(Value::Array(items)) => Value::Array(decode_items(items)),
            _ => Value::String(text),
        },
        Value::Object(inner) => Value::Object(decode_map(inner)),
        Value::Array(items) => Value::Array(decode_items(items)),
        other => other,
    }
}

// Maps inside lists are expanded; bare strings inside lists are data.
fn decode_items(items: Vec<Value>) -> Vec<Value> {
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(inner) => Value::Object(decode_map(inner)),
            other => other,
        })
        .collect()
}
