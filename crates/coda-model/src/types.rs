// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Message types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One block inside a message.
///
/// Tool results record `is_error` redundantly with the `"error"` key inside
/// `output`; the flag is what the executor and the UI read, the key is what
/// the model sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolCall {
        /// Provider-assigned id, unique within the conversation.
        id: String,
        name: String,
        /// JSON object of arguments as produced by the model.
        parameters: Value,
    },
    ToolResult {
        /// Matches a prior `ToolCall::id`.
        id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, parameters: Value) -> Self {
        Self::ToolCall {
            id: id.into(),
            name: name.into(),
            parameters,
        }
    }

    /// Build a tool-result block; `is_error` is derived from the presence of
    /// an `"error"` key in `output`.
    pub fn tool_result(id: impl Into<String>, name: impl Into<String>, output: Value) -> Self {
        let is_error = output.get("error").is_some();
        Self::ToolResult {
            id: id.into(),
            name: name.into(),
            output,
            is_error,
        }
    }
}

/// A single message in the conversation: a role plus an ordered list of
/// content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            blocks: vec![ContentBlock::text(text)],
        }
    }

    /// Assistant turn as returned by the provider: optional text followed by
    /// the tool-call blocks, in model order.
    pub fn assistant_turn(text: Option<&str>, tool_calls: &[ToolCallRequest]) -> Self {
        let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
        if let Some(t) = text {
            if !t.is_empty() {
                blocks.push(ContentBlock::text(t));
            }
        }
        for tc in tool_calls {
            blocks.push(ContentBlock::tool_call(&tc.id, &tc.name, tc.parameters.clone()));
        }
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    /// User message carrying one tool-result block per executed call.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks: results,
        }
    }

    /// Concatenated text of all `Text` blocks.  Empty string when there are
    /// none.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.blocks.iter().filter_map(|b| match b {
            ContentBlock::ToolCall { id, name, parameters } => {
                Some((id.as_str(), name.as_str(), parameters))
            }
            _ => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        self.blocks
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolCall { .. }))
    }
}

// ─── Provider-facing request/response ────────────────────────────────────────

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: Value,
}

/// Everything a provider needs to perform one completion call.
///
/// Built by the AI worker from a conversation snapshot; the provider turns
/// it into its own wire format.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub max_completion_tokens: u32,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSchema>,
    /// When false, no cache-control hints are emitted.
    pub cache_hints: bool,
}

/// One tool invocation requested by the model, after sanitization: `id` and
/// `name` are guaranteed non-empty and `parameters` is always an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub parameters: Value,
}

/// A successfully parsed assistant response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// Assistant text, if any.
    pub text: Option<String>,
    /// Sanitized tool calls in model order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The raw provider response body, kept for the audit log.
    pub raw: Value,
}

/// The outcome of one provider attempt — success or failure, plus the
/// metadata the retry controller and the audit sink need.
#[derive(Debug, Clone)]
pub struct ApiCallResult {
    pub response: Option<ApiResponse>,
    /// HTTP status of the attempt; 0 when the request never reached the wire.
    pub http_status: u16,
    pub error_message: Option<String>,
    /// Whether the retry controller may try again.
    pub is_retryable: bool,
    pub duration_ms: u64,
    /// True when the provider refreshed its credentials during this attempt.
    pub auth_refreshed: bool,
    /// The request body that was sent, for the audit log.
    pub request_json: Value,
}

impl ApiCallResult {
    /// Failure that never reached the server (spawn/transport error).
    pub fn transport_error(message: impl Into<String>, duration_ms: u64, request_json: Value) -> Self {
        Self {
            response: None,
            http_status: 0,
            error_message: Some(message.into()),
            is_retryable: true,
            duration_ms,
            auth_refreshed: false,
            request_json,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn user_message_has_single_text_block() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.text(), "hello");
        assert!(!m.has_tool_calls());
    }

    #[test]
    fn assistant_turn_orders_text_before_tool_calls() {
        let calls = vec![
            ToolCallRequest { id: "a".into(), name: "Read".into(), parameters: json!({}) },
            ToolCallRequest { id: "b".into(), name: "Bash".into(), parameters: json!({}) },
        ];
        let m = Message::assistant_turn(Some("thinking"), &calls);
        assert!(matches!(m.blocks[0], ContentBlock::Text { .. }));
        assert!(matches!(m.blocks[1], ContentBlock::ToolCall { .. }));
        assert_eq!(m.tool_calls().count(), 2);
        let ids: Vec<_> = m.tool_calls().map(|(id, _, _)| id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn assistant_turn_without_text_has_only_tool_calls() {
        let calls = vec![ToolCallRequest {
            id: "x".into(),
            name: "Glob".into(),
            parameters: json!({"pattern": "*.rs"}),
        }];
        let m = Message::assistant_turn(None, &calls);
        assert_eq!(m.blocks.len(), 1);
        assert!(m.has_tool_calls());
        assert_eq!(m.text(), "");
    }

    #[test]
    fn tool_result_derives_is_error_from_error_key() {
        let ok = ContentBlock::tool_result("1", "Read", json!({"content": "x"}));
        let err = ContentBlock::tool_result("2", "Read", json!({"error": "no such file"}));
        assert!(matches!(ok, ContentBlock::ToolResult { is_error: false, .. }));
        assert!(matches!(err, ContentBlock::ToolResult { is_error: true, .. }));
    }

    #[test]
    fn text_concatenates_multiple_text_blocks() {
        let m = Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::text("a"), ContentBlock::text("b")],
        };
        assert_eq!(m.text(), "ab");
    }

    #[test]
    fn message_round_trips_through_serde() {
        let m = Message::assistant_turn(
            Some("ok"),
            &[ToolCallRequest {
                id: "call_1".into(),
                name: "Bash".into(),
                parameters: json!({"command": "ls"}),
            }],
        );
        let s = serde_json::to_string(&m).unwrap();
        let back: Message = serde_json::from_str(&s).unwrap();
        assert_eq!(back.role, Role::Assistant);
        assert_eq!(back.tool_calls().count(), 1);
    }

    #[test]
    fn transport_error_is_retryable_with_zero_status() {
        let r = ApiCallResult::transport_error("connection refused", 12, json!({}));
        assert!(r.is_retryable);
        assert_eq!(r.http_status, 0);
        assert!(r.response.is_none());
    }
}
