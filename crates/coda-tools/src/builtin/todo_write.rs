// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::events::{TodoItem, TodoStatus, ToolEvent};
use crate::tool::{Tool, ToolCall};

pub struct TodoWriteTool {
    ctx: Arc<ToolContext>,
}

impl TodoWriteTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "TodoWrite"
    }

    fn description(&self) -> &str {
        "Replace the session todo list.\n\
         Each item needs 'content' (imperative phrasing), 'activeForm'\n\
         (present-continuous phrasing shown while in progress), and 'status'\n\
         (pending | in_progress | completed).\n\
         Calling TodoWrite replaces the entire list, not a merge.\n\
         Use for multi-step tasks; mark items completed immediately after\n\
         finishing them."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "The full todo list (replaces the existing one)",
                    "items": {
                        "type": "object",
                        "properties": {
                            "content": { "type": "string", "description": "Task description" },
                            "activeForm": { "type": "string", "description": "Present-continuous form" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                                "description": "Current status"
                            }
                        },
                        "required": ["content", "activeForm", "status"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let raw = match call.parameters.get("todos").and_then(|v| v.as_array()) {
            Some(arr) => arr.clone(),
            None => return json!({ "error": "missing 'todos' array" }),
        };

        let mut items: Vec<TodoItem> = Vec::with_capacity(raw.len());
        for (i, item) in raw.iter().enumerate() {
            let content = match item.get("content").and_then(|v| v.as_str()) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => return json!({ "error": format!("todo #{i} missing 'content'") }),
            };
            let active_form = match item.get("activeForm").and_then(|v| v.as_str()) {
                Some(s) => s.to_string(),
                None => return json!({ "error": format!("todo #{i} missing 'activeForm'") }),
            };
            let status = match item
                .get("status")
                .and_then(|v| v.as_str())
                .and_then(TodoStatus::parse)
            {
                Some(s) => s,
                None => return json!({ "error": format!("todo #{i} has an invalid 'status'") }),
            };
            items.push(TodoItem { content, active_form, status });
        }

        debug!(count = items.len(), "TodoWrite tool");

        let added = {
            let mut todos = self.ctx.todos.lock().expect("todo list poisoned");
            let added = items
                .iter()
                .filter(|it| !todos.iter().any(|old| old.content == it.content))
                .count();
            *todos = items.clone();
            added
        };

        let rendered = render_table(&items);
        self.ctx.post_event(ToolEvent::TodoUpdate(items.clone()));

        json!({
            "status": "success",
            "added": added,
            "total": items.len(),
            "rendered": rendered,
        })
    }
}

fn render_table(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "Todo list cleared.".to_string();
    }
    let lines: Vec<String> = items
        .iter()
        .map(|t| match t.status {
            TodoStatus::Completed => format!("[x] {}", t.content),
            TodoStatus::InProgress => format!("[>] {}", t.active_form),
            TodoStatus::Pending => format!("[ ] {}", t.content),
        })
        .collect();
    lines.join("\n")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
