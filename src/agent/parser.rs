//! Decoding of the model's JSON protocol.

use serde_json::{Map, Value};

/// What the model asked for in one response.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    /// `{"answer": ...}`
    FinalAnswer { text: String },
    /// `{"tool": ..., "tool_args": {...}}`
    ToolInvocation {
        tool_name: String,
        arguments: Map<String, Value>,
    },
    /// Anything else; the raw text is used as the answer.
    Unparseable { raw_text: String },
}

/// Parse a raw model response.
///
/// The trimmed text is decoded as JSON first; a code fence is unwrapped only
/// when that fails, so fences inside string values are left alone.
pub fn parse(text: &str) -> AgentDecision {
    let unparseable = || AgentDecision::Unparseable {
        raw_text: text.to_string(),
    };

    let value = match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => value,
        Err(_) => match serde_json::from_str::<Value>(unwrap_fence(text)) {
            Ok(value) => value,
            Err(_) => return unparseable(),
        },
    };
    let Value::Object(mut object) = value else {
        return unparseable();
    };

    if let Some(answer) = object.remove("answer") {
        let text = match answer {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return AgentDecision::FinalAnswer { text };
    }

    let Some(Value::String(tool_name)) = object.remove("tool") else {
        return unparseable();
    };

    let arguments = match object.remove("tool_args") {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            tracing::debug!(tool_args = %other, "Ignoring non-object tool_args");
            Map::new()
        }
    };

    AgentDecision::ToolInvocation {
        tool_name,
        arguments,
    }
}

/// Return the body of the first fenced code block, or the trimmed text when
/// there is none. The opening fence may carry a language tag, on its own line
/// or directly before the body.
fn unwrap_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };

    let after_fence = &trimmed[start + 3..];
    let tag_len = after_fence
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(after_fence.len());
    let body = &after_fence[tag_len..];

    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}
