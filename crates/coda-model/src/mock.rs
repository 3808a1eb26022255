// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use crate::{ApiCallResult, ApiResponse, ChatRequest, ToolCallRequest};

/// A pre-scripted provider.  Each `call_api` pops the next result from the
/// front of the queue, letting tests specify exact outcome sequences —
/// including rate limits and tool calls — without network access.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<ApiCallResult>>,
    /// The last `ChatRequest` seen, so tests can inspect what was sent.
    pub last_request: Mutex<Option<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<ApiCallResult>) -> Self {
        Self {
            scripts: Mutex::new(results.into()),
            last_request: Mutex::new(None),
        }
    }

    /// Successful attempt carrying a plain text reply.
    pub fn text(reply: impl Into<String>) -> ApiCallResult {
        let reply = reply.into();
        ApiCallResult {
            response: Some(ApiResponse {
                text: Some(reply.clone()),
                tool_calls: vec![],
                raw: json!({"choices": [{"message": {"content": reply}}]}),
            }),
            http_status: 200,
            error_message: None,
            is_retryable: false,
            duration_ms: 1,
            auth_refreshed: false,
            request_json: json!({}),
        }
    }

    /// Successful attempt carrying tool calls (and optional text).
    pub fn tool_calls(text: Option<&str>, calls: Vec<ToolCallRequest>) -> ApiCallResult {
        ApiCallResult {
            response: Some(ApiResponse {
                text: text.map(str::to_string),
                tool_calls: calls,
                raw: json!({"scripted": true}),
            }),
            http_status: 200,
            error_message: None,
            is_retryable: false,
            duration_ms: 1,
            auth_refreshed: false,
            request_json: json!({}),
        }
    }

    /// Failed attempt with the given HTTP status; retryability follows the
    /// standard classification.
    pub fn http_error(status: u16) -> ApiCallResult {
        ApiCallResult {
            response: None,
            http_status: status,
            error_message: Some(format!("HTTP {status}: scripted failure")),
            is_retryable: crate::openai_compat::is_retryable_status(status),
            duration_ms: 1,
            auth_refreshed: false,
            request_json: json!({}),
        }
    }

    /// Failed attempt that never reached the server.
    pub fn transport_failure(message: impl Into<String>) -> ApiCallResult {
        ApiCallResult::transport_error(message, 1, json!({}))
    }
}

#[async_trait]
impl crate::Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted-model"
    }

    async fn call_api(&self, req: &ChatRequest) -> ApiCallResult {
        *self.last_request.lock().expect("mock poisoned") = Some(req.clone());
        self.scripts
            .lock()
            .expect("mock poisoned")
            .pop_front()
            .unwrap_or_else(|| ApiCallResult {
                response: None,
                http_status: 0,
                error_message: Some("mock script exhausted".into()),
                is_retryable: false,
                duration_ms: 0,
                auth_refreshed: false,
                request_json: json!({}),
            })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Message, Provider};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "m".into(),
            max_completion_tokens: 16,
            messages: vec![Message::user("hi")],
            tools: vec![],
            cache_hints: false,
        }
    }

    #[tokio::test]
    async fn pops_results_in_order() {
        let p = ScriptedProvider::new(vec![
            ScriptedProvider::http_error(429),
            ScriptedProvider::text("second"),
        ]);
        let first = p.call_api(&request()).await;
        assert_eq!(first.http_status, 429);
        let second = p.call_api(&request()).await;
        assert_eq!(second.response.unwrap().text.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn exhausted_script_is_non_retryable_error() {
        let p = ScriptedProvider::new(vec![]);
        let r = p.call_api(&request()).await;
        assert!(r.response.is_none());
        assert!(!r.is_retryable);
    }

    #[tokio::test]
    async fn records_last_request() {
        let p = ScriptedProvider::new(vec![ScriptedProvider::text("ok")]);
        p.call_api(&request()).await;
        let seen = p.last_request.lock().unwrap();
        assert_eq!(seen.as_ref().unwrap().model, "m");
    }
}
