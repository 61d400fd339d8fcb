//! Turns the JSON found inside a tool tag into canonical [`ToolRequest`]s.
//!
//! Two payload shapes are accepted and produce the same requests:
//! - a single call object, `{"name": "search", "arguments": {"q": "x"}}`
//!   (`parameters` is accepted in place of `arguments`)
//! - an OpenAI style array, `{"tool_calls": [{"id": "1", "type": "function",
//!   "function": {"name": "search", "arguments": "{\"q\":\"x\"}"}}]}`
//!
//! A bare JSON array of call objects is read as parallel calls. Requests whose payload carries no
//! id get an empty id; the caller assigns one.

use serde_json::{Map, Value};

use crate::errors::NormalizeError;
use crate::models::tool::ToolRequest;

/// Parse a raw payload and normalize every call in it, in payload order
pub fn normalize_payload(payload: &str) -> Result<Vec<ToolRequest>, NormalizeError> {
    let value: Value = serde_json::from_str(payload.trim())
        .map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
    normalize_value(&value)
}

pub fn normalize_value(value: &Value) -> Result<Vec<ToolRequest>, NormalizeError> {
    match value {
        Value::Object(object) => match object.get("tool_calls") {
            Some(Value::Array(calls)) => normalize_calls(calls),
            Some(_) => Err(NormalizeError::UnsupportedShape),
            None => Ok(vec![call_from_object(object)?]),
        },
        Value::Array(calls) => normalize_calls(calls),
        _ => Err(NormalizeError::UnsupportedShape),
    }
}

fn normalize_calls(calls: &[Value]) -> Result<Vec<ToolRequest>, NormalizeError> {
    if calls.is_empty() {
        return Err(NormalizeError::EmptyCalls);
    }
    calls
        .iter()
        .map(|call| match call {
            Value::Object(object) => call_from_object(object),
            _ => Err(NormalizeError::UnsupportedShape),
        })
        .collect()
}

fn call_from_object(object: &Map<String, Value>) -> Result<ToolRequest, NormalizeError> {
    // OpenAI style entries nest the call under "function"
    let call = match object.get("function") {
        Some(Value::Object(function)) => function,
        Some(_) => return Err(NormalizeError::UnsupportedShape),
        None => object,
    };

    let raw_name = call
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or(NormalizeError::MissingName)?;

    let raw_arguments = call.get("arguments").or_else(|| call.get("parameters"));
    let (arguments, arguments_value) = match raw_arguments {
        None | Some(Value::Null) => ("{}".to_string(), Value::Object(Map::new())),
        Some(Value::String(text)) if text.trim().is_empty() => {
            ("{}".to_string(), Value::Object(Map::new()))
        }
        // stringified arguments must be complete JSON themselves
        Some(Value::String(text)) => {
            let text = text.trim();
            let value: Value = serde_json::from_str(text)
                .map_err(|e| NormalizeError::InvalidJson(format!("arguments: {}", e)))?;
            (text.to_string(), value)
        }
        Some(value @ (Value::Object(_) | Value::Array(_))) => (value.to_string(), value.clone()),
        Some(_) => return Err(NormalizeError::UnsupportedShape),
    };

    let id = object
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let (name, display_name) = normalize_name(raw_name, &arguments_value);

    let request = ToolRequest::new(id, name, arguments);
    Ok(match display_name {
        Some(display_name) => request.with_display_name(display_name),
        None => request,
    })
}

/// Collapse `<tool>.<action>` to `<tool>` when the arguments already carry `"action": "<action>"`.
///
/// Returns the canonical name and, when it was collapsed, the original name for display.
pub fn normalize_name(name: &str, arguments: &Value) -> (String, Option<String>) {
    if let Some((tool, action)) = name.rsplit_once('.') {
        let redundant = !tool.is_empty()
            && !action.is_empty()
            && arguments.get("action").and_then(Value::as_str) == Some(action);
        if redundant {
            return (tool.to_string(), Some(name.to_string()));
        }
    }
    (name.to_string(), None)
}
