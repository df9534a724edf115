//! Canonical <-> OpenAI chat-completions translation
//!
//! Pure functions, no I/O. Request direction:
//! - system text becomes a leading `system` message
//! - `tool_result` blocks become `tool` messages ahead of the user's text
//! - `tool_use` blocks become assistant `tool_calls` with JSON-string arguments
//! - tool declarations move `input_schema` to `function.parameters`
//!
//! Response direction maps `finish_reason` and usage back into canonical form.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::AdapterError;
use crate::canonical::{
    CanonicalMessage, CanonicalRequest, CanonicalResponse, ContentBlock, Role, StopReason,
    ToolChoice, ToolDeclaration, Usage,
};

/// Map an OpenAI `finish_reason` to a canonical stop reason
pub fn translate_finish_reason(reason: &str) -> StopReason {
    match reason {
        "length" => StopReason::MaxTokens,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        // "stop", "content_filter" and anything new
        _ => StopReason::EndTurn,
    }
}

/// Build the OpenAI request body
///
/// `model` is the already-selected upstream model; `system` the already
/// rendered system text.
pub fn to_openai_request(
    request: &CanonicalRequest,
    model: &str,
    system: Option<&str>,
) -> Result<Value, AdapterError> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        messages.push(json!({"role": "system", "content": system}));
    }

    for message in &request.messages {
        match message.role {
            Role::User => push_user_message(&mut messages, message),
            Role::Assistant => messages.push(assistant_message(message)?),
        }
    }

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), Value::Array(messages));

    if let Some(max_tokens) = request.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = request.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(stream) = request.stream {
        body.insert("stream".to_string(), json!(stream));
    }
    if let Some(top_p) = request.extra.get("top_p") {
        body.insert("top_p".to_string(), top_p.clone());
    }
    if let Some(stop) = request.extra.get("stop_sequences") {
        body.insert("stop".to_string(), stop.clone());
    }

    if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
        body.insert(
            "tools".to_string(),
            Value::Array(tools.iter().map(tool_declaration).collect()),
        );
        if let Some(choice) = &request.tool_choice {
            body.insert("tool_choice".to_string(), tool_choice(choice));
        }
    }

    Ok(Value::Object(body))
}

fn push_user_message(messages: &mut Vec<Value>, message: &CanonicalMessage) {
    let blocks = message.content.blocks();
    let mut parts = Vec::new();
    let mut has_image = false;

    for block in blocks {
        match block {
            ContentBlock::Text { text } => parts.push(json!({"type": "text", "text": text})),
            ContentBlock::Image { source } => {
                has_image = true;
                parts.push(json!({"type": "image_url", "image_url": {"url": source.to_url()}}));
            }
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let mut text = content.map(|c| c.as_text()).unwrap_or_default();
                if is_error.unwrap_or(false) {
                    text = format!("Error: {text}");
                }
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": text
                }));
            }
            ContentBlock::ToolUse { .. } | ContentBlock::Unsupported => {}
        }
    }

    if parts.is_empty() {
        return;
    }

    let content = if has_image {
        Value::Array(parts)
    } else {
        let text = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n");
        Value::String(text)
    };

    messages.push(json!({"role": "user", "content": content}));
}

fn assistant_message(message: &CanonicalMessage) -> Result<Value, AdapterError> {
    let mut texts = Vec::new();
    let mut tool_calls = Vec::new();

    for block in message.content.blocks() {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            ContentBlock::ToolUse { id, name, input } => {
                let arguments = serde_json::to_string(&input)
                    .map_err(|e| AdapterError::Translation(format!("tool_use '{name}': {e}")))?;
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }));
            }
            _ => {}
        }
    }

    let text = texts.join("\n");
    let mut out = Map::new();
    out.insert("role".to_string(), json!("assistant"));
    out.insert(
        "content".to_string(),
        if text.is_empty() && !tool_calls.is_empty() {
            Value::Null
        } else {
            Value::String(text)
        },
    );
    if !tool_calls.is_empty() {
        out.insert("tool_calls".to_string(), Value::Array(tool_calls));
    }
    Ok(Value::Object(out))
}

fn tool_declaration(tool: &ToolDeclaration) -> Value {
    let mut function = Map::new();
    function.insert("name".to_string(), json!(tool.name));
    if let Some(description) = &tool.description {
        function.insert("description".to_string(), json!(description));
    }
    function.insert("parameters".to_string(), tool.input_schema.clone());
    json!({"type": "function", "function": function})
}

fn tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::Any => json!("required"),
        ToolChoice::None => json!("none"),
        ToolChoice::Tool { name } => json!({"type": "function", "function": {"name": name}}),
    }
}

/// Convert an OpenAI chat-completion body into a canonical response
pub fn from_openai_response(
    response: &Value,
    fallback_model: &str,
) -> Result<CanonicalResponse, AdapterError> {
    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| AdapterError::UnexpectedResponse("response has no choices".to_string()))?;

    let message = choice
        .get("message")
        .ok_or_else(|| AdapterError::UnexpectedResponse("choice has no message".to_string()))?;

    let mut content = Vec::new();

    let text = match message.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };
    if !text.is_empty() {
        content.push(ContentBlock::Text { text });
    }

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        for call in calls {
            content.push(tool_use_block(call)?);
        }
    }

    let stop_reason = choice
        .get("finish_reason")
        .and_then(Value::as_str)
        .map(translate_finish_reason)
        .or(Some(StopReason::EndTurn));

    let usage = response
        .get("usage")
        .map(|usage| Usage {
            input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
            output_tokens: usage
                .get("completion_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
        .unwrap_or_default();

    let id = response
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("msg_{}", Uuid::new_v4().simple()));

    let model = response
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(fallback_model)
        .to_string();

    Ok(CanonicalResponse {
        id,
        kind: "message".to_string(),
        role: Role::Assistant,
        model,
        content,
        stop_reason,
        stop_sequence: None,
        usage,
    })
}

fn tool_use_block(call: &Value) -> Result<ContentBlock, AdapterError> {
    let function = call
        .get("function")
        .ok_or_else(|| AdapterError::UnexpectedResponse("tool call has no function".to_string()))?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let arguments = function
        .get("arguments")
        .and_then(Value::as_str)
        .unwrap_or("");

    let input = if arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(arguments).map_err(|e| AdapterError::MalformedToolArguments {
            tool: name.clone(),
            reason: e.to_string(),
        })?
    };

    let id = call
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple()));

    Ok(ContentBlock::ToolUse { id, name, input })
}
