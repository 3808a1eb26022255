// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! Engine-level tests driving the worker loop with a scripted provider.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use coda_model::{
    ApiCallResult, AuditSink, AuditStatus, ContentBlock, MemorySink, Role, ScriptedProvider,
    ToolCallRequest,
};
use coda_tools::builtin::register_builtin;
use coda_tools::{ToolContext, ToolRegistry};

use crate::{Agent, AgentSettings, ConversationStore, UiEvent};

struct TestRig {
    agent: Agent,
    ui_rx: mpsc::Receiver<UiEvent>,
    store: Arc<ConversationStore>,
    sink: Arc<MemorySink>,
    tool_ctx: Arc<ToolContext>,
    _tmp: tempfile::TempDir,
}

fn rig(scripts: Vec<ApiCallResult>) -> TestRig {
    let tmp = tempfile::tempdir().unwrap();
    let (tool_event_tx, tool_event_rx) = mpsc::channel(64);
    let tool_ctx = Arc::new(ToolContext::new(
        tmp.path().to_path_buf(),
        vec![],
        Arc::new(AtomicBool::new(false)),
        tool_event_tx,
        30,
        100,
    ));
    let mut registry = ToolRegistry::new();
    register_builtin(&mut registry, &tool_ctx);
    let registry = Arc::new(registry);

    let store = Arc::new(ConversationStore::new(
        "test system prompt",
        Arc::clone(&tool_ctx.todos),
    ));
    let sink = Arc::new(MemorySink::new());
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let agent = Agent::new(
        Arc::clone(&store),
        registry,
        Arc::clone(&tool_ctx),
        Arc::new(ScriptedProvider::new(scripts)),
        sink.clone() as Arc<dyn AuditSink>,
        AgentSettings {
            model: "scripted-model".into(),
            endpoint_url: "http://test/v1/chat/completions".into(),
            max_retry_duration_ms: 1_000,
            max_completion_tokens: 1024,
            cache_hints: true,
        },
        ui_tx,
        tool_event_rx,
    );

    TestRig { agent, ui_rx, store, sink, tool_ctx, _tmp: tmp }
}

fn drain_ui(rx: &mut mpsc::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn text_response_flows_to_store_and_ui() {
    let mut r = rig(vec![ScriptedProvider::text("hello from the model")]);
    r.agent.run_instruction("hi").await;

    let snap = r.store.snapshot();
    assert_eq!(snap.len(), 3);
    assert_eq!(snap[0].role, Role::System);
    assert_eq!(snap[1].text(), "hi");
    assert_eq!(snap[2].role, Role::Assistant);
    assert_eq!(snap[2].text(), "hello from the model");

    let events = drain_ui(&mut r.ui_rx);
    assert!(events.contains(&UiEvent::AddLine("hello from the model".into())));
    assert!(events.contains(&UiEvent::Status("ready".into())));
}

#[tokio::test]
async fn tool_round_trip_matches_call_and_result_ids() {
    let calls = vec![
        ToolCallRequest { id: "t1".into(), name: "Sleep".into(), parameters: json!({"duration": 0}) },
        ToolCallRequest { id: "t2".into(), name: "NoSuchTool".into(), parameters: json!({}) },
    ];
    let mut r = rig(vec![
        ScriptedProvider::tool_calls(Some("working on it"), calls),
        ScriptedProvider::text("all done"),
    ]);
    r.agent.run_instruction("do things").await;

    let snap = r.store.snapshot();
    // system, user, assistant(text+2 calls), user(2 results), assistant(text)
    assert_eq!(snap.len(), 5);

    let call_ids: Vec<&str> = snap[2].tool_calls().map(|(id, _, _)| id).collect();
    assert_eq!(call_ids, vec!["t1", "t2"]);

    // Every tool call is answered by exactly one result, in call order.
    let results: Vec<(&str, bool)> = snap[3]
        .blocks
        .iter()
        .map(|b| match b {
            ContentBlock::ToolResult { id, is_error, .. } => (id.as_str(), *is_error),
            other => panic!("expected ToolResult, got {other:?}"),
        })
        .collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], ("t1", false));
    assert_eq!(results[1].0, "t2");
    assert!(results[1].1, "unknown tool must produce an error result");

    assert_eq!(snap[4].text(), "all done");

    // Both completions were reported as cumulative session stats.
    let events = drain_ui(&mut r.ui_rx);
    let stats: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            UiEvent::Stats { tools_completed } => Some(*tools_completed),
            _ => None,
        })
        .collect();
    assert_eq!(stats, vec![1, 2], "one Stats event per completed tool: {events:?}");
}

#[tokio::test]
async fn cancellation_mid_batch_synthesizes_results_and_skips_next_call() {
    let calls = vec![
        ToolCallRequest {
            id: "todo".into(),
            name: "TodoWrite".into(),
            parameters: json!({"todos": [
                {"content": "a", "activeForm": "doing a", "status": "pending"},
                {"content": "b", "activeForm": "doing b", "status": "pending"},
                {"content": "c", "activeForm": "doing c", "status": "pending"}
            ]}),
        },
        ToolCallRequest { id: "nap".into(), name: "Sleep".into(), parameters: json!({"duration": 30}) },
    ];
    // Only one script: a second API call would consume the exhausted-script
    // error, which the audit count below would expose.
    let mut r = rig(vec![ScriptedProvider::tool_calls(None, calls)]);

    let flag = Arc::clone(&r.tool_ctx.interrupt);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        flag.store(true, Ordering::SeqCst);
    });

    r.agent.run_instruction("todo then sleep").await;

    let snap = r.store.snapshot();
    assert_eq!(snap.len(), 4, "system, user, assistant, tool results");

    let results = &snap[3].blocks;
    assert_eq!(results.len(), 2, "every call answered despite cancellation");
    match &results[0] {
        ContentBlock::ToolResult { id, output, is_error, .. } => {
            assert_eq!(id, "todo");
            assert!(!is_error, "TodoWrite finished before the interrupt: {output}");
            assert_eq!(output["total"], 3);
        }
        other => panic!("unexpected block {other:?}"),
    }
    match &results[1] {
        ContentBlock::ToolResult { id, output, is_error, .. } => {
            assert_eq!(id, "nap");
            assert!(is_error);
            assert!(output["error"].as_str().unwrap().contains("cancelled"), "{output}");
        }
        other => panic!("unexpected block {other:?}"),
    }

    // The worker observed the cancellation and skipped the follow-up call.
    assert_eq!(r.sink.records().len(), 1, "exactly one API attempt");

    let events = drain_ui(&mut r.ui_rx);
    assert!(events.contains(&UiEvent::Status("cancelled".into())));
}

#[tokio::test]
async fn fatal_api_error_surfaces_and_keeps_user_turn() {
    let mut r = rig(vec![ScriptedProvider::http_error(400)]);
    r.agent.run_instruction("trigger an error").await;

    let snap = r.store.snapshot();
    assert_eq!(snap.len(), 2, "user turn is retained after the failure");
    assert_eq!(snap[1].text(), "trigger an error");

    let events = drain_ui(&mut r.ui_rx);
    assert!(
        events.iter().any(|e| matches!(e, UiEvent::Error(msg) if msg.contains("400"))),
        "expected an error event: {events:?}"
    );

    let records = r.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, AuditStatus::Error);
}

#[tokio::test]
async fn empty_model_response_reports_error() {
    let mut r = rig(vec![ScriptedProvider::tool_calls(None, vec![])]);
    r.agent.run_instruction("hello").await;

    let snap = r.store.snapshot();
    assert_eq!(snap.len(), 2, "no empty assistant message is stored");

    let events = drain_ui(&mut r.ui_rx);
    assert!(events.iter().any(|e| matches!(e, UiEvent::Error(_))), "{events:?}");
}

#[tokio::test]
async fn todo_update_is_rendered_to_the_ui() {
    let calls = vec![ToolCallRequest {
        id: "todo".into(),
        name: "TodoWrite".into(),
        parameters: json!({"todos": [
            {"content": "write code", "activeForm": "writing code", "status": "in_progress"}
        ]}),
    }];
    let mut r = rig(vec![
        ScriptedProvider::tool_calls(None, calls),
        ScriptedProvider::text("done"),
    ]);
    r.agent.run_instruction("make a plan").await;

    let events = drain_ui(&mut r.ui_rx);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, UiEvent::AddLine(l) if l.contains("[>] writing code"))),
        "todo table missing from UI events: {events:?}"
    );
}

#[tokio::test]
async fn run_resets_interrupt_between_instructions() {
    let r = rig(vec![ScriptedProvider::text("fresh start")]);
    // Simulate a leftover interrupt from a previous, cancelled instruction.
    r.tool_ctx.interrupt.store(true, Ordering::SeqCst);

    let (tx, rx) = mpsc::channel(16);
    let store = Arc::clone(&r.store);
    let mut ui_rx = r.ui_rx;
    let handle = tokio::spawn(r.agent.run(rx));

    tx.send("hello again".to_string()).await.unwrap();
    drop(tx);
    handle.await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.len(), 3, "instruction ran despite the stale flag");
    assert_eq!(snap[2].text(), "fresh start");
    let events = drain_ui(&mut ui_rx);
    assert!(events.contains(&UiEvent::AddLine("fresh start".into())));
}

#[tokio::test]
async fn request_carries_system_prefix_and_tool_schemas() {
    let mut r = rig(vec![ScriptedProvider::text("ok")]);
    // Keep a handle to the provider through the agent is not possible once
    // moved; instead verify through the audit record's request body.
    r.agent.run_instruction("check request shape").await;

    let records = r.sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].session_id.len(), 36, "uuid session id");
    assert_eq!(records[0].model, "scripted-model");
    assert_eq!(records[0].endpoint_url, "http://test/v1/chat/completions");
}
