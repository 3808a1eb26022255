// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// One entry of the session todo list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub content: String,
    /// Present-continuous phrasing shown while the item is in progress.
    pub active_form: String,
    pub status: TodoStatus,
}

/// Out-of-band events emitted by tools while they run.  The agent drains
/// these and forwards them to the UI.
#[derive(Debug, Clone)]
pub enum ToolEvent {
    /// The todo list was replaced.
    TodoUpdate(Vec<TodoItem>),
    /// A file-modifying tool produced a unified diff for display.
    Diff { path: String, diff: String },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values() {
        assert_eq!(TodoStatus::parse("pending"), Some(TodoStatus::Pending));
        assert_eq!(TodoStatus::parse("in_progress"), Some(TodoStatus::InProgress));
        assert_eq!(TodoStatus::parse("completed"), Some(TodoStatus::Completed));
        assert_eq!(TodoStatus::parse("cancelled"), None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&TodoStatus::InProgress).unwrap();
        assert_eq!(s, "\"in_progress\"");
    }
}
