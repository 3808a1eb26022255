// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! Provider-independent request document builder.
//!
//! Produces the chat-completions JSON body from the internal conversation
//! shape.  Two details matter for provider-side prompt caching:
//!
//! - the system message and the final three messages are rendered with
//!   content-array syntax (`[{type:"text", text, cache_control?}]`) so a
//!   cache hint can be attached to the stable prefix and to the tail;
//! - tool definitions carry a hint on the first and the last tool.
//!
//! Hints are suppressed entirely when [`ChatRequest::cache_hints`] is false
//! (the `DISABLE_PROMPT_CACHING` switch).

use serde_json::{json, Value};

use crate::{ChatRequest, ContentBlock, Message, Role};

/// How many trailing messages are rendered with content-array syntax so the
/// conversation tail can carry a cache hint.
const CACHED_TAIL_MESSAGES: usize = 3;

fn cache_hint() -> Value {
    json!({ "type": "ephemeral" })
}

/// Build the full request body: `{model, max_completion_tokens, messages, tools}`.
pub fn build_request(req: &ChatRequest) -> Value {
    let mut body = json!({
        "model": req.model,
        "max_completion_tokens": req.max_completion_tokens,
        "messages": build_messages(&req.messages, req.cache_hints),
    });
    if !req.tools.is_empty() {
        body["tools"] = Value::Array(build_tools(req));
    }
    body
}

/// Render the internal message list into the wire-format `messages` array.
///
/// Each `ToolResult` block becomes its own `role:"tool"` message with
/// stringified-JSON content; consecutive `ToolCall` blocks of one assistant
/// message become a single `tool_calls` array, as the wire contract requires.
pub fn build_messages(messages: &[Message], cache_hints: bool) -> Vec<Value> {
    let tail_start = messages.len().saturating_sub(CACHED_TAIL_MESSAGES);
    let mut out: Vec<Value> = Vec::with_capacity(messages.len());

    for (idx, m) in messages.iter().enumerate() {
        let is_last = idx + 1 == messages.len();
        match m.role {
            Role::System => {
                // Content-array syntax so the stable prefix is cacheable.
                let mut block = json!({ "type": "text", "text": m.text() });
                if cache_hints {
                    block["cache_control"] = cache_hint();
                }
                out.push(json!({ "role": "system", "content": [block] }));
            }
            Role::Assistant if m.has_tool_calls() => {
                let text = m.text();
                let calls: Vec<Value> = m
                    .tool_calls()
                    .map(|(id, name, params)| {
                        json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": params.to_string(),
                            }
                        })
                    })
                    .collect();
                out.push(json!({
                    "role": "assistant",
                    "content": if text.is_empty() { Value::Null } else { Value::String(text) },
                    "tool_calls": calls,
                }));
            }
            Role::User if has_tool_results(m) => {
                for b in &m.blocks {
                    if let ContentBlock::ToolResult { id, output, .. } = b {
                        out.push(json!({
                            "role": "tool",
                            "tool_call_id": id,
                            "content": output.to_string(),
                        }));
                    }
                }
            }
            Role::User | Role::Assistant => {
                let role = match m.role {
                    Role::User => "user",
                    _ => "assistant",
                };
                if idx >= tail_start {
                    let mut block = json!({ "type": "text", "text": m.text() });
                    if cache_hints && is_last {
                        block["cache_control"] = cache_hint();
                    }
                    out.push(json!({ "role": role, "content": [block] }));
                } else {
                    out.push(json!({ "role": role, "content": m.text() }));
                }
            }
        }
    }
    out
}

fn has_tool_results(m: &Message) -> bool {
    m.blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
}

fn build_tools(req: &ChatRequest) -> Vec<Value> {
    let last = req.tools.len().saturating_sub(1);
    req.tools
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let mut v = json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            });
            if req.cache_hints && (i == 0 || i == last) {
                v["cache_control"] = cache_hint();
            }
            v
        })
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
