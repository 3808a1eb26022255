// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::ToolContext;
use crate::tool::{Tool, ToolCall};

/// Poll interval of the cooperative wait.
const TICK_MS: u64 = 100;

/// Interruptible sleep, kept around for exercising the executor and the
/// cancellation path end to end.
pub struct SleepTool {
    ctx: Arc<ToolContext>,
}

impl SleepTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "Sleep"
    }

    fn description(&self) -> &str {
        "Sleep for the given number of seconds. Interruptible."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "duration": {
                    "type": "integer",
                    "description": "Seconds to sleep"
                }
            },
            "required": ["duration"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let duration = match call.parameters.get("duration").and_then(|v| v.as_u64()) {
            Some(d) => d,
            None => return json!({ "error": "missing required parameter 'duration'" }),
        };

        let mut remaining_ms = duration * 1000;
        while remaining_ms > 0 {
            if self.ctx.interrupted() {
                return json!({ "error": "cancelled" });
            }
            let chunk = remaining_ms.min(TICK_MS);
            tokio::time::sleep(Duration::from_millis(chunk)).await;
            remaining_ms -= chunk;
        }
        json!({ "status": "success", "duration": duration })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
