// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use coda_model::{ContentBlock, Message, Role};
use coda_tools::events::TodoItem;
use tracing::error;

/// Hard cap on stored messages.  Appends past the cap are dropped and
/// logged; the process keeps running.
pub const MAX_MESSAGES: usize = 10_000;

/// The ordered conversation history.
///
/// One coarse mutex guards the list; every critical section is a plain
/// vector operation, brief next to the HTTP round-trips that surround it.
/// Index 0 is always the system message, which survives [`clear`].
///
/// [`clear`]: ConversationStore::clear
pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    /// Todo list handle shared with the TodoWrite tool; emptied on clear.
    todos: Arc<Mutex<Vec<TodoItem>>>,
}

impl ConversationStore {
    pub fn new(system_text: impl Into<String>, todos: Arc<Mutex<Vec<TodoItem>>>) -> Self {
        Self {
            messages: Mutex::new(vec![Message::system(system_text)]),
            todos,
        }
    }

    /// Append one message.  Returns `false` when the message was dropped:
    /// the store is at capacity, or an assistant message arrived with no
    /// blocks (those are rejected at ingest — an empty assistant turn would
    /// be meaningless to send back to the provider).
    pub fn append(&self, message: Message) -> bool {
        if message.role == Role::Assistant && message.blocks.is_empty() {
            error!("rejecting empty assistant message");
            return false;
        }
        let mut messages = self.messages.lock().expect("conversation poisoned");
        if messages.len() >= MAX_MESSAGES {
            error!(capacity = MAX_MESSAGES, "conversation at capacity; dropping message");
            return false;
        }
        messages.push(message);
        true
    }

    /// Append the tool-results user message for one batch, taking ownership
    /// of the result blocks.
    pub fn append_tool_results(&self, results: Vec<ContentBlock>) -> bool {
        self.append(Message::tool_results(results))
    }

    /// Drop everything but the system message and empty the todo list.
    pub fn clear(&self) {
        let mut messages = self.messages.lock().expect("conversation poisoned");
        messages.truncate(1);
        self.todos.lock().expect("todo list poisoned").clear();
    }

    /// Clone of the full message list for the request builder.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().expect("conversation poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("conversation poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use coda_tools::events::{TodoItem, TodoStatus};
    use serde_json::json;

    use super::*;

    fn store() -> ConversationStore {
        ConversationStore::new("system prompt", Arc::new(Mutex::new(Vec::new())))
    }

    #[test]
    fn starts_with_exactly_the_system_message() {
        let s = store();
        let snap = s.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].role, Role::System);
        assert_eq!(snap[0].text(), "system prompt");
    }

    #[test]
    fn append_preserves_order() {
        let s = store();
        s.append(Message::user("one"));
        s.append(Message::assistant("two"));
        s.append(Message::user("three"));
        let snap = s.snapshot();
        assert_eq!(snap.len(), 4);
        assert_eq!(snap[1].text(), "one");
        assert_eq!(snap[2].text(), "two");
        assert_eq!(snap[3].text(), "three");
    }

    #[test]
    fn empty_assistant_message_rejected() {
        let s = store();
        let rejected = s.append(Message { role: Role::Assistant, blocks: vec![] });
        assert!(!rejected);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn clear_keeps_system_and_empties_todos() {
        let todos = Arc::new(Mutex::new(vec![TodoItem {
            content: "task".into(),
            active_form: "doing task".into(),
            status: TodoStatus::Pending,
        }]));
        let s = ConversationStore::new("sys", Arc::clone(&todos));
        s.append(Message::user("hello"));
        s.append(Message::assistant("hi"));

        s.clear();

        let snap = s.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].role, Role::System);
        assert!(todos.lock().unwrap().is_empty());
    }

    #[test]
    fn append_tool_results_creates_user_message() {
        let s = store();
        s.append_tool_results(vec![
            ContentBlock::tool_result("c1", "Read", json!({"content": "x"})),
            ContentBlock::tool_result("c2", "Bash", json!({"error": "boom"})),
        ]);
        let snap = s.snapshot();
        assert_eq!(snap[1].role, Role::User);
        assert_eq!(snap[1].blocks.len(), 2);
    }

    #[test]
    fn over_capacity_append_is_dropped() {
        let s = store();
        for i in 0..(MAX_MESSAGES - 1) {
            assert!(s.append(Message::user(format!("m{i}"))), "append {i} failed early");
        }
        assert_eq!(s.len(), MAX_MESSAGES);
        // The store is full now; the next append must be a no-op.
        assert!(!s.append(Message::user("one too many")));
        assert_eq!(s.len(), MAX_MESSAGES);
        // Invariants continue to hold: index 0 is still the system message.
        assert_eq!(s.snapshot()[0].role, Role::System);
    }
}
