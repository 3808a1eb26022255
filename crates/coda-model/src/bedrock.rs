// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! AWS Bedrock driver — non-streaming Converse API.
//!
//! Request signing is NOT implemented here: Bedrock authentication goes
//! through the [`RequestSigner`] boundary, which the embedding application
//! wires to its cloud credential machinery.  This keeps the provider free of
//! any SigV4 / STS details while still supporting the bounded
//! refresh-on-auth-failure behaviour surfaced via
//! [`ApiCallResult::auth_refreshed`].
//!
//! # Model IDs
//! Use Bedrock cross-region inference profile IDs or regional model IDs,
//! e.g. `us.anthropic.claude-sonnet-4-20250514-v1:0`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::sanitize::{sanitize_tool_calls, RawToolCall};
use crate::{ApiCallResult, ApiResponse, ChatRequest, ContentBlock, Message, Role};

/// One outgoing HTTP request as seen by the signer.
pub struct SigningInput<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub body: &'a [u8],
}

/// The cloud signing boundary.
///
/// Implementations produce whatever auth headers their credential source
/// requires.  `refresh` is consulted once per call after an auth failure
/// (401/403); returning `true` means new credentials are available and the
/// attempt is repeated.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, input: &SigningInput) -> anyhow::Result<Vec<(String, String)>>;

    fn refresh(&self) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Signer for Bedrock API keys: a static bearer token read from
/// `AWS_BEARER_TOKEN_BEDROCK`.  `refresh` re-reads the variable so a token
/// rotated by an external credential helper is picked up after one auth
/// failure.
pub struct BearerTokenSigner {
    token: std::sync::Mutex<String>,
}

impl BearerTokenSigner {
    const TOKEN_ENV: &'static str = "AWS_BEARER_TOKEN_BEDROCK";

    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var(Self::TOKEN_ENV)
            .map_err(|_| anyhow::anyhow!("{} is not set", Self::TOKEN_ENV))?;
        Ok(Self { token: std::sync::Mutex::new(token) })
    }
}

impl RequestSigner for BearerTokenSigner {
    fn sign(&self, _input: &SigningInput) -> anyhow::Result<Vec<(String, String)>> {
        let token = self.token.lock().expect("signer poisoned").clone();
        Ok(vec![("authorization".into(), format!("Bearer {token}"))])
    }

    fn refresh(&self) -> anyhow::Result<bool> {
        let fresh = std::env::var(Self::TOKEN_ENV)?;
        let mut token = self.token.lock().expect("signer poisoned");
        if fresh != *token {
            *token = fresh;
            return Ok(true);
        }
        Ok(false)
    }
}

pub struct BedrockProvider {
    model: String,
    endpoint_url: String,
    signer: Arc<dyn RequestSigner>,
    client: reqwest::Client,
}

impl BedrockProvider {
    pub fn new(model: impl Into<String>, region: &str, signer: Arc<dyn RequestSigner>) -> Self {
        let model = model.into();
        let endpoint_url = format!(
            "https://bedrock-runtime.{region}.amazonaws.com/model/{model}/converse"
        );
        Self {
            model,
            endpoint_url,
            signer,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// One signed POST.  Separated from `call_api` so the auth-refresh path
    /// can repeat it.
    async fn attempt(&self, body_bytes: &[u8]) -> anyhow::Result<(u16, Value)> {
        let input = SigningInput {
            method: "POST",
            url: &self.endpoint_url,
            body: body_bytes,
        };
        let headers = self.signer.sign(&input)?;

        let mut req = self
            .client
            .post(&self.endpoint_url)
            .header("content-type", "application/json")
            .body(body_bytes.to_vec());
        for (name, value) in headers {
            req = req.header(name, value);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        Ok((status, body))
    }
}

#[async_trait]
impl crate::Provider for BedrockProvider {
    fn name(&self) -> &str {
        "bedrock"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn call_api(&self, req: &ChatRequest) -> ApiCallResult {
        let body = build_converse_body(req);
        let body_bytes = body.to_string().into_bytes();
        debug!(model = %self.model, message_count = req.messages.len(), "sending converse request");

        let started = Instant::now();
        let mut auth_refreshed = false;

        let mut outcome = self.attempt(&body_bytes).await;
        let auth_failed = matches!(&outcome, Ok((status, _)) if matches!(*status, 401 | 403));
        if auth_failed {
            // One bounded refresh on auth failure, then repeat the attempt.
            match self.signer.refresh() {
                Ok(true) => {
                    warn!("auth failure; credentials refreshed, retrying once");
                    auth_refreshed = true;
                    outcome = self.attempt(&body_bytes).await;
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "credential refresh failed"),
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let (status, raw) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                let mut r = ApiCallResult::transport_error(
                    format!("converse request failed: {e}"),
                    duration_ms,
                    body,
                );
                r.auth_refreshed = auth_refreshed;
                return r;
            }
        };

        if !(200..300).contains(&status) {
            return ApiCallResult {
                response: None,
                http_status: status,
                error_message: Some(format!("HTTP {status}: {raw}")),
                is_retryable: crate::openai_compat::is_retryable_status(status),
                duration_ms,
                auth_refreshed,
                request_json: body,
            };
        }

        let (text, raw_calls) = parse_converse_output(&raw);
        let tool_calls = sanitize_tool_calls(raw_calls);
        ApiCallResult {
            response: Some(ApiResponse { text, tool_calls, raw }),
            http_status: status,
            error_message: None,
            is_retryable: false,
            duration_ms,
            auth_refreshed,
            request_json: body,
        }
    }
}

/// Translate the internal conversation shape into a Converse request body.
///
/// Converse keeps system text in its own array and represents tool traffic
/// as `toolUse` / `toolResult` content blocks on user/assistant messages.
fn build_converse_body(req: &ChatRequest) -> Value {
    let mut system: Vec<Value> = Vec::new();
    let mut messages: Vec<Value> = Vec::new();

    for m in &req.messages {
        if m.role == Role::System {
            system.push(json!({ "text": m.text() }));
            continue;
        }
        messages.push(json!({
            "role": match m.role { Role::User => "user", _ => "assistant" },
            "content": converse_content(m),
        }));
    }

    let mut body = json!({
        "system": system,
        "messages": messages,
        "inferenceConfig": { "maxTokens": req.max_completion_tokens },
    });
    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "toolSpec": {
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": { "json": t.parameters },
                    }
                })
            })
            .collect();
        body["toolConfig"] = json!({ "tools": tools });
    }
    body
}

fn converse_content(m: &Message) -> Vec<Value> {
    m.blocks
        .iter()
        .map(|b| match b {
            ContentBlock::Text { text } => json!({ "text": text }),
            ContentBlock::ToolCall { id, name, parameters } => json!({
                "toolUse": { "toolUseId": id, "name": name, "input": parameters }
            }),
            ContentBlock::ToolResult { id, output, is_error, .. } => json!({
                "toolResult": {
                    "toolUseId": id,
                    "content": [{ "json": output }],
                    "status": if *is_error { "error" } else { "success" },
                }
            }),
        })
        .collect()
}

fn parse_converse_output(v: &Value) -> (Option<String>, Vec<RawToolCall>) {
    let content = v["output"]["message"]["content"].as_array();
    let mut text = String::new();
    let mut calls: Vec<RawToolCall> = Vec::new();

    if let Some(blocks) = content {
        for b in blocks {
            if let Some(t) = b["text"].as_str() {
                text.push_str(t);
            }
            if let Some(tu) = b.get("toolUse") {
                calls.push(RawToolCall {
                    id: tu["toolUseId"].as_str().unwrap_or("").to_string(),
                    name: tu["name"].as_str().unwrap_or("").to_string(),
                    arguments: tu["input"].to_string(),
                });
            }
        }
    }

    let text = if text.is_empty() { None } else { Some(text) };
    (text, calls)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
