// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! OpenAI-compatible chat completions provider.
//!
//! Speaks the standard non-streaming `/chat/completions` wire format that
//! most hosted and local endpoints accept.  Performs exactly one HTTP
//! attempt per `call_api`; classification of the outcome (retryable or not)
//! is encoded in the returned [`ApiCallResult`] and acted on by
//! [`crate::retry`].

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::sanitize::{sanitize_tool_calls, RawToolCall};
use crate::{request, ApiCallResult, ApiResponse, ChatRequest};

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    chat_url: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// `api_base` ends before `/chat/completions`, e.g.
    /// `https://api.openai.com/v1`.
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, api_base: &str) -> Self {
        let base = api_base.trim_end_matches('/');
        Self {
            model: model.into(),
            api_key: api_key.into(),
            chat_url: format!("{base}/chat/completions"),
            client: reqwest::Client::new(),
        }
    }

    /// The endpoint URL requests are posted to (recorded in audit entries).
    pub fn endpoint_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl crate::Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn call_api(&self, req: &ChatRequest) -> ApiCallResult {
        let body = request::build_request(req);
        debug!(
            model = %self.model,
            message_count = req.messages.len(),
            tool_count = req.tools.len(),
            "sending completion request"
        );

        let started = Instant::now();
        let resp = self
            .client
            .post(&self.chat_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                // Never reached the server (or no response): connection
                // refused, DNS, timeout.  All transport failures retry.
                return ApiCallResult::transport_error(
                    format!("request failed: {e}"),
                    started.elapsed().as_millis() as u64,
                    body,
                );
            }
        };

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return ApiCallResult {
                response: None,
                http_status: status,
                error_message: Some(format!("HTTP {status}: {text}")),
                is_retryable: is_retryable_status(status),
                duration_ms: started.elapsed().as_millis() as u64,
                auth_refreshed: false,
                request_json: body,
            };
        }

        let raw: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                // A 200 with an unparseable body is a protocol violation,
                // not a transient fault.
                return ApiCallResult {
                    response: None,
                    http_status: status,
                    error_message: Some(format!("malformed JSON response: {e}")),
                    is_retryable: false,
                    duration_ms: started.elapsed().as_millis() as u64,
                    auth_refreshed: false,
                    request_json: body,
                };
            }
        };

        let (text, raw_calls) = parse_assistant_message(&raw);
        let tool_calls = sanitize_tool_calls(raw_calls);
        ApiCallResult {
            response: Some(ApiResponse { text, tool_calls, raw }),
            http_status: status,
            error_message: None,
            is_retryable: false,
            duration_ms: started.elapsed().as_millis() as u64,
            auth_refreshed: false,
            request_json: body,
        }
    }
}

/// HTTP 408, 429 and every 5xx are transient; everything else is permanent.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..=599).contains(&status)
}

/// Extract `choices[0].message` into assistant text plus raw tool calls.
fn parse_assistant_message(v: &Value) -> (Option<String>, Vec<RawToolCall>) {
    let message = &v["choices"][0]["message"];
    let text = message["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let calls = message["tool_calls"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|tc| RawToolCall {
                    id: tc["id"].as_str().unwrap_or("").to_string(),
                    name: tc["function"]["name"].as_str().unwrap_or("").to_string(),
                    arguments: tc["function"]["arguments"].as_str().unwrap_or("").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    (text, calls)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
