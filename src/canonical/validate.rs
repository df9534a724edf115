//! Inbound body parsing and schema checks
//!
//! Parsing and validation run on the raw JSON value so the pass-through
//! adapter can forward exactly what the caller sent.

use axum::http::{header, HeaderMap};
use serde::Deserialize;
use serde_json::Value;

use super::types::CanonicalRequest;
use crate::error::{AppError, AppResult};

pub const MAX_MODEL_LENGTH: usize = 100;
pub const MAX_OUTPUT_TOKENS: u64 = 4096;

/// Parse the inbound body into a JSON object
///
/// Non-JSON content or unparseable bodies are `INVALID_REQUEST`; an empty
/// body, `null` or `{}` is `EMPTY_REQUEST`.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> AppResult<Value> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if !is_json {
        return Err(AppError::InvalidRequest("Request must be JSON".to_string()));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::EmptyRequest);
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::InvalidRequest(format!("Invalid JSON: {}", e)))?;

    match &value {
        Value::Null => Err(AppError::EmptyRequest),
        Value::Object(map) if map.is_empty() => Err(AppError::EmptyRequest),
        _ => Ok(value),
    }
}

/// Check a parsed body against the canonical request schema
///
/// Field bounds are checked first for readable messages, then the whole body
/// must deserialize as a [`CanonicalRequest`] so block and tool shapes are
/// caught here rather than in an adapter. An empty `messages` array is
/// accepted; only its type is checked.
pub fn validate_request(body: &Value) -> AppResult<()> {
    let object = body
        .as_object()
        .ok_or_else(|| invalid("Request body must be a JSON object"))?;

    match object.get("model") {
        Some(Value::String(model)) if model.is_empty() => {
            return Err(invalid("Field 'model' must not be empty"))
        }
        Some(Value::String(model)) if model.chars().count() > MAX_MODEL_LENGTH => {
            return Err(invalid(format!(
                "Field 'model' must be at most {} characters",
                MAX_MODEL_LENGTH
            )))
        }
        Some(Value::String(_)) => {}
        Some(_) => return Err(invalid("Field 'model' must be a string")),
        None => return Err(invalid("Missing required field: model")),
    }

    match object.get("messages") {
        Some(Value::Array(messages)) => {
            for (index, message) in messages.iter().enumerate() {
                validate_message(index, message)?;
            }
        }
        Some(_) => return Err(invalid("Field 'messages' must be a list")),
        None => return Err(invalid("Missing required field: messages")),
    }

    if let Some(max_tokens) = object.get("max_tokens") {
        match max_tokens.as_u64() {
            Some(n) if (1..=MAX_OUTPUT_TOKENS).contains(&n) => {}
            _ => {
                return Err(invalid(format!(
                    "Field 'max_tokens' must be an integer between 1 and {}",
                    MAX_OUTPUT_TOKENS
                )))
            }
        }
    }

    if let Some(temperature) = object.get("temperature") {
        match temperature.as_f64() {
            Some(t) if (0.0..=1.0).contains(&t) => {}
            _ => {
                return Err(invalid(
                    "Field 'temperature' must be a number between 0 and 1",
                ))
            }
        }
    }

    if let Some(tools) = object.get("tools") {
        if !tools.is_array() {
            return Err(invalid("Field 'tools' must be a list"));
        }
    }

    if let Some(tool_choice) = object.get("tool_choice") {
        if !tool_choice.is_object() {
            return Err(invalid("Field 'tool_choice' must be an object"));
        }
    }

    if let Some(stream) = object.get("stream") {
        if !stream.is_boolean() {
            return Err(invalid("Field 'stream' must be a boolean"));
        }
    }

    CanonicalRequest::deserialize(body)
        .map_err(|e| invalid(format!("Invalid request shape: {e}")))?;

    Ok(())
}

fn validate_message(index: usize, message: &Value) -> AppResult<()> {
    let role = message.get("role").and_then(Value::as_str);
    if !matches!(role, Some("user") | Some("assistant")) {
        return Err(invalid(format!(
            "messages[{}].role must be 'user' or 'assistant'",
            index
        )));
    }

    match message.get("content") {
        Some(Value::String(_)) | Some(Value::Array(_)) => Ok(()),
        _ => Err(invalid(format!(
            "messages[{}].content must be a string or a list of content blocks",
            index
        ))),
    }
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::Validation(message.into())
}
