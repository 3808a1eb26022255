// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! Response sanitization shared by all providers.
//!
//! Models occasionally emit tool calls that violate the contract the rest of
//! the engine relies on: an empty id, a missing name, or arguments that are
//! not valid JSON.  The policy here:
//!
//! - empty **name** → the call cannot be dispatched; drop it (keeping it
//!   would corrupt the history sent back on the next turn);
//! - empty **id** → synthesize one so the turn can complete without the
//!   provider rejecting the follow-up request;
//! - unparseable or non-object **arguments** → substitute `{}`.

use serde_json::Value;
use tracing::warn;

use crate::ToolCallRequest;

/// A tool call as it came off the wire, before any guarantees hold.
#[derive(Debug, Clone, Default)]
pub struct RawToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object (possibly malformed).
    pub arguments: String,
}

pub fn sanitize_tool_calls(raw: Vec<RawToolCall>) -> Vec<ToolCallRequest> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, rc) in raw.into_iter().enumerate() {
        if rc.name.is_empty() {
            warn!(tool_call_id = %rc.id, "dropping tool call with empty name; cannot dispatch");
            continue;
        }
        let id = if rc.id.is_empty() {
            let synthetic = format!("call_synthetic_{i}");
            warn!(tool_name = %rc.name, id = %synthetic, "tool call had empty id; synthesized one");
            synthetic
        } else {
            rc.id
        };
        let parameters = parse_arguments(&rc.name, &id, &rc.arguments);
        out.push(ToolCallRequest { id, name: rc.name, parameters });
    }
    out
}

/// Parse the JSON argument string, falling back to `{}` on anything that is
/// not a JSON object.
fn parse_arguments(name: &str, id: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Object(_)) => v,
        Ok(other) => {
            warn!(
                tool_name = %name,
                tool_call_id = %id,
                got = %other,
                "tool arguments were not a JSON object; substituting {{}}"
            );
            Value::Object(Default::default())
        }
        Err(e) => {
            warn!(
                tool_name = %name,
                tool_call_id = %id,
                error = %e,
                "tool arguments were invalid JSON; substituting {{}}"
            );
            Value::Object(Default::default())
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
