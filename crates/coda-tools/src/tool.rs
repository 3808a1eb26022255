// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier assigned by the provider (forwarded verbatim).
    pub id: String,
    pub name: String,
    /// Parsed JSON argument object.
    pub parameters: Value,
}

/// The result of executing one tool call.
///
/// `value` is always a JSON object; `is_error` mirrors the presence of an
/// `"error"` key inside it, which is the single error-marking convention
/// every tool follows.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub tool_name: String,
    pub value: Value,
    pub is_error: bool,
}

impl ToolOutput {
    /// Wrap a tool's raw return value, deriving `is_error` from the
    /// `"error"` key.  A `null` return is normalized to an error object —
    /// a tool that produced nothing has no way of being represented in the
    /// conversation otherwise.
    pub fn from_value(call_id: impl Into<String>, tool_name: impl Into<String>, value: Value) -> Self {
        let value = match value {
            Value::Null => json!({ "error": "Unknown tool" }),
            v @ Value::Object(_) => v,
            other => json!({ "error": format!("tool returned a non-object result: {other}") }),
        };
        let is_error = value.get("error").is_some();
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            value,
            is_error,
        }
    }

    /// Error result with a human-readable message.
    pub fn err(call_id: impl Into<String>, tool_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            value: json!({ "error": msg.into() }),
            is_error: true,
        }
    }
}

/// Trait every built-in and plugin-backed tool implements.
///
/// `execute` returns the raw JSON result; wrapping into [`ToolOutput`]
/// happens in the registry so the error-key convention is enforced in one
/// place.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the parameter object.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, call: &ToolCall) -> Value;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
