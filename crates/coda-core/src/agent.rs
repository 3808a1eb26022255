// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use coda_model::{
    call_with_retry, AuditSink, CallError, ChatRequest, ContentBlock, Message, Provider,
    ToolCallRequest,
};
use coda_tools::events::{TodoItem, TodoStatus, ToolEvent};
use coda_tools::{execute_batch, ProgressCallback, ProgressUpdate, ToolCall, ToolContext, ToolRegistry};

use crate::conversation::ConversationStore;
use crate::events::UiEvent;

/// Static knobs the worker needs per session.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    /// Recorded in audit entries alongside each request.
    pub endpoint_url: String,
    pub max_retry_duration_ms: u64,
    pub max_completion_tokens: u32,
    /// When false, requests carry no cache-control hints.
    pub cache_hints: bool,
}

/// The AI worker.  Consumes user instructions from a bounded queue and
/// drives the model ↔ tool loop, posting render events to the UI queue.
pub struct Agent {
    store: Arc<ConversationStore>,
    registry: Arc<ToolRegistry>,
    tool_ctx: Arc<ToolContext>,
    provider: Arc<dyn Provider>,
    sink: Arc<dyn AuditSink>,
    settings: AgentSettings,
    session_id: String,
    /// Tool executions completed since session start; reported to the UI
    /// through [`UiEvent::Stats`] after every completion.
    tools_completed: Arc<AtomicUsize>,
    ui: mpsc::Sender<UiEvent>,
    /// Out-of-band events (diffs, todo updates) emitted by tools while a
    /// batch runs; drained after each batch and forwarded to the UI.
    tool_events: mpsc::Receiver<ToolEvent>,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ConversationStore>,
        registry: Arc<ToolRegistry>,
        tool_ctx: Arc<ToolContext>,
        provider: Arc<dyn Provider>,
        sink: Arc<dyn AuditSink>,
        settings: AgentSettings,
        ui: mpsc::Sender<UiEvent>,
        tool_events: mpsc::Receiver<ToolEvent>,
    ) -> Self {
        Self {
            store,
            registry,
            tool_ctx,
            provider,
            sink,
            settings,
            session_id: Uuid::new_v4().to_string(),
            tools_completed: Arc::new(AtomicUsize::new(0)),
            ui,
            tool_events,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Worker main loop: block on the instruction queue until it closes.
    pub async fn run(mut self, mut instructions: mpsc::Receiver<String>) {
        while let Some(instruction) = instructions.recv().await {
            // A leftover interrupt from the previous instruction must not
            // cancel this one.
            self.tool_ctx.interrupt.store(false, Ordering::SeqCst);
            self.run_instruction(&instruction).await;
        }
        self.provider.cleanup();
    }

    /// One instruction: user turn, then rounds of (model call → tool batch)
    /// until the model answers in plain text or something ends the turn.
    pub(crate) async fn run_instruction(&mut self, text: &str) {
        self.store.append(Message::user(text));

        loop {
            if self.tool_ctx.interrupt.load(Ordering::SeqCst) {
                // Cancellation observed between rounds: the tool results of
                // the last batch are already in the store, so the
                // conversation stays well-formed for the next instruction.
                self.post(UiEvent::Status("cancelled".into())).await;
                return;
            }

            self.post(UiEvent::Status("thinking…".into())).await;
            let request = self.build_request();
            let response = match call_with_retry(
                self.provider.as_ref(),
                &request,
                self.settings.max_retry_duration_ms,
                self.sink.as_ref(),
                &self.session_id,
                &self.settings.endpoint_url,
                &self.tool_ctx.interrupt,
            )
            .await
            {
                Ok(r) => r,
                Err(CallError::Cancelled) => {
                    self.post(UiEvent::Status("cancelled".into())).await;
                    return;
                }
                Err(e) => {
                    // Fatal or budget-exhausted: end the instruction; the
                    // user turn stays in the store.
                    self.post(UiEvent::Error(e.to_string())).await;
                    self.post(UiEvent::Status("ready".into())).await;
                    return;
                }
            };

            if response.tool_calls.is_empty() {
                match response.text {
                    Some(t) if !t.is_empty() => {
                        self.store.append(Message::assistant(&t));
                        self.post(UiEvent::AddLine(t)).await;
                    }
                    _ => {
                        warn!("model returned neither text nor tool calls");
                        self.post(UiEvent::Error("model returned an empty response".into()))
                            .await;
                    }
                }
                self.post(UiEvent::Status("ready".into())).await;
                return;
            }

            if let Some(t) = response.text.as_deref().filter(|t| !t.is_empty()) {
                self.post(UiEvent::AddLine(t.to_string())).await;
            }
            self.store
                .append(Message::assistant_turn(response.text.as_deref(), &response.tool_calls));

            let calls = to_tool_calls(&response.tool_calls);
            debug!(count = calls.len(), "dispatching tool batch");
            self.post(UiEvent::Status(format!("running {} tool(s)…", calls.len())))
                .await;

            let outputs = execute_batch(
                &self.registry,
                &calls,
                &self.tool_ctx.interrupt,
                self.progress_callback(),
            )
            .await;

            self.forward_tool_events().await;

            let results: Vec<ContentBlock> = outputs
                .into_iter()
                .map(|o| ContentBlock::tool_result(o.call_id, o.tool_name, o.value))
                .collect();
            self.store.append_tool_results(results);
            // Loop: the next round either sends the results to the model or
            // observes a cancellation raised during the batch.
        }
    }

    fn build_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.settings.model.clone(),
            max_completion_tokens: self.settings.max_completion_tokens,
            messages: self.store.snapshot(),
            tools: self
                .registry
                .schemas()
                .into_iter()
                .map(|s| coda_model::ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect(),
            cache_hints: self.settings.cache_hints,
        }
    }

    /// Per-completion status updates.  Uses `try_send`: progress display is
    /// droppable, blocking a tool worker on the UI queue is not acceptable.
    fn progress_callback(&self) -> ProgressCallback {
        let ui = self.ui.clone();
        let counter = Arc::clone(&self.tools_completed);
        Arc::new(move |u: ProgressUpdate| {
            let marker = if u.is_error { "✗" } else { "✓" };
            let _ = ui.try_send(UiEvent::Status(format!(
                "{marker} {} ({}/{})",
                u.tool_name, u.completed, u.total
            )));
            let session_total = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let _ = ui.try_send(UiEvent::Stats { tools_completed: session_total });
        })
    }

    async fn forward_tool_events(&mut self) {
        while let Ok(ev) = self.tool_events.try_recv() {
            match ev {
                ToolEvent::TodoUpdate(items) => {
                    self.post(UiEvent::AddLine(render_todos(&items))).await;
                }
                ToolEvent::Diff { path, diff } => {
                    self.post(UiEvent::AddLine(format!("── {path} ──\n{diff}"))).await;
                }
            }
        }
    }

    /// Post one render event.  When the UI queue is closed (shutdown), fall
    /// back to direct terminal output so nothing is silently lost.
    async fn post(&self, event: UiEvent) {
        if let Err(e) = self.ui.send(event).await {
            match e.0 {
                UiEvent::AddLine(s) | UiEvent::Error(s) => eprintln!("{s}"),
                UiEvent::Status(_) | UiEvent::Stats { .. } | UiEvent::Clear => {}
            }
        }
    }
}

fn to_tool_calls(requests: &[ToolCallRequest]) -> Vec<ToolCall> {
    requests
        .iter()
        .map(|r| ToolCall {
            id: r.id.clone(),
            name: r.name.clone(),
            parameters: r.parameters.clone(),
        })
        .collect()
}

fn render_todos(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "Todo list cleared.".to_string();
    }
    items
        .iter()
        .map(|t| match t.status {
            TodoStatus::Completed => format!("[x] {}", t.content),
            TodoStatus::InProgress => format!("[>] {}", t.active_form),
            TodoStatus::Pending => format!("[ ] {}", t.content),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
