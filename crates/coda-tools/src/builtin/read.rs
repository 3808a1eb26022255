// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncBufReadExt;
use tracing::debug;

use crate::context::ToolContext;
use crate::resolve::resolve_path;
use crate::tool::{Tool, ToolCall};

/// Interval (in lines) at which the line walk re-checks the interrupt flag.
const CANCEL_CHECK_LINES: usize = 1000;

pub struct ReadTool {
    ctx: Arc<ToolContext>,
}

impl ReadTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Read a file from the local filesystem.\n\
         file_path resolves against the working directory when relative.\n\
         start_line / end_line (1-indexed, inclusive) select a range; reading\n\
         stops at end_line, so pulling the head of a large file is cheap.\n\
         Use Grep to find the relevant region first, then Read just that range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or working-directory-relative path"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to return (1-indexed, default 1)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to return (inclusive)"
                }
            },
            "required": ["file_path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let file_path = match call.parameters.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return json!({ "error": "missing required parameter 'file_path'" }),
        };
        let start_line = match line_param(&call.parameters, "start_line") {
            Ok(v) => v,
            Err(e) => return e,
        };
        let end_line = match line_param(&call.parameters, "end_line") {
            Ok(v) => v,
            Err(e) => return e,
        };
        if let (Some(s), Some(e)) = (start_line, end_line) {
            if s > e {
                return json!({ "error": format!("start_line ({s}) must be <= end_line ({e})") });
            }
        }

        let path = resolve_path(&self.ctx.working_dir, file_path);
        debug!(path = %path.display(), ?start_line, ?end_line, "Read tool");

        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) => return json!({ "error": format!("cannot read {}: {e}", path.display()) }),
        };

        let start = start_line.unwrap_or(1);
        let mut lines = tokio::io::BufReader::new(file).lines();
        let mut content = String::new();
        let mut total_lines: usize = 0;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(l)) => l,
                Ok(None) => break,
                Err(e) => return json!({ "error": format!("read error: {e}") }),
            };
            total_lines += 1;
            if total_lines % CANCEL_CHECK_LINES == 0 && self.ctx.interrupted() {
                return json!({ "error": "cancelled" });
            }
            if total_lines >= start {
                content.push_str(&line);
                content.push('\n');
            }
            // The walk stops at end_line; lines past it are neither read nor
            // counted.
            if end_line.is_some_and(|e| total_lines >= e) {
                break;
            }
        }

        let mut result = json!({ "content": content, "total_lines": total_lines });
        if let Some(s) = start_line {
            result["start_line"] = json!(s);
        }
        if let Some(e) = end_line {
            result["end_line"] = json!(e);
        }
        result
    }
}

/// Parse an optional 1-indexed line parameter, rejecting zero and negatives.
fn line_param(params: &Value, key: &str) -> Result<Option<usize>, Value> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n >= 1 => Ok(Some(n as usize)),
            Some(n) => Err(json!({ "error": format!("{key} must be >= 1, got {n}") })),
            None => Err(json!({ "error": format!("{key} must be an integer") })),
        },
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
