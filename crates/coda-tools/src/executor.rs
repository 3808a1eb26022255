// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Parallel tool executor.
//!
//! For each assistant turn with `N` tool calls, `N` result slots are
//! allocated and the calls fan out as concurrent tasks.  The hard invariant
//! enforced here: **every tool call gets exactly one tool result**, at the
//! slot index matching its call index, no matter how the batch ends —
//! normal completion, task panic, or cancellation.  A violated invariant
//! would make the provider reject the next request, so synthetic results
//! stand in wherever a real one is missing.
//!
//! Cancellation is cooperative: tools poll the shared interrupt flag at
//! their own checkpoints.  The dispatcher polls the same flag on a 100 ms
//! tick; once raised, it aborts outstanding tasks and fills their slots with
//! synthetic `"cancelled"` results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{ToolCall, ToolOutput, ToolRegistry};

/// Dispatcher poll interval while waiting for completions.
const WAIT_TICK_MS: u64 = 100;

/// Completion counters for one batch of parallel tool calls.
#[derive(Debug, Default)]
struct TrackerState {
    total: usize,
    completed: usize,
    error_count: usize,
    cancelled: bool,
}

/// Shared completion tracker.  Each worker reports exactly once; the
/// dispatcher reads the counters for progress display and to decide when
/// the batch is done.
#[derive(Debug)]
pub struct ToolExecutionTracker {
    state: Mutex<TrackerState>,
}

impl ToolExecutionTracker {
    pub fn new(total: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState {
                total,
                ..Default::default()
            }),
        }
    }

    /// Record one completion.  Returns `(completed, total)` after the update.
    fn complete(&self, is_error: bool) -> (usize, usize) {
        let mut s = self.state.lock().expect("tracker poisoned");
        s.completed += 1;
        if is_error {
            s.error_count += 1;
        }
        (s.completed, s.total)
    }

    fn set_cancelled(&self) {
        self.state.lock().expect("tracker poisoned").cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.lock().expect("tracker poisoned").cancelled
    }

    pub fn completed(&self) -> usize {
        self.state.lock().expect("tracker poisoned").completed
    }

    pub fn total(&self) -> usize {
        self.state.lock().expect("tracker poisoned").total
    }

    pub fn error_count(&self) -> usize {
        self.state.lock().expect("tracker poisoned").error_count
    }
}

/// Progress snapshot delivered after each completion.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub tool_name: String,
    pub is_error: bool,
    pub completed: usize,
    pub total: usize,
}

pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Execute one batch of tool calls in parallel.
///
/// Returns exactly `calls.len()` outputs, index-aligned with `calls`.
pub async fn execute_batch(
    registry: &Arc<ToolRegistry>,
    calls: &[ToolCall],
    interrupt: &Arc<AtomicBool>,
    progress: ProgressCallback,
) -> Vec<ToolOutput> {
    let total = calls.len();
    let tracker = Arc::new(ToolExecutionTracker::new(total));
    let mut slots: Vec<Option<ToolOutput>> = vec![None; total];
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, ToolOutput)>();
    let mut handles: Vec<Option<tokio::task::JoinHandle<()>>> = Vec::with_capacity(total);

    let fill =
        |slots: &mut Vec<Option<ToolOutput>>, idx: usize, out: ToolOutput| {
            let (completed, total) = tracker.complete(out.is_error);
            progress(ProgressUpdate {
                tool_name: out.tool_name.clone(),
                is_error: out.is_error,
                completed,
                total,
            });
            slots[idx] = Some(out);
        };

    for (idx, call) in calls.iter().enumerate() {
        // A provider bug can still hand us a call with no id or name; the
        // slot is pre-filled so the batch accounting stays exact.
        if call.id.is_empty() || call.name.is_empty() {
            warn!(index = idx, "malformed tool call without id or name");
            let out = ToolOutput::err(&call.id, &call.name, "malformed tool call: missing id or name");
            fill(&mut slots, idx, out);
            handles.push(None);
            continue;
        }
        // Calls observed after an interrupt never start.
        if interrupt.load(Ordering::SeqCst) {
            let out = ToolOutput::err(&call.id, &call.name, "cancelled before start");
            fill(&mut slots, idx, out);
            handles.push(None);
            continue;
        }

        let registry = Arc::clone(registry);
        let call = call.clone();
        let tx = tx.clone();
        handles.push(Some(tokio::spawn(async move {
            let out = registry.execute(&call).await;
            // Receiver gone means the batch was abandoned; nothing to do.
            let _ = tx.send((idx, out));
        })));
    }
    drop(tx);

    debug!(total, "tool batch dispatched");

    // Wait for completions on a 100 ms tick, checking the interrupt flag on
    // every wake.
    while tracker.completed() < total {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Some((idx, out)) => fill(&mut slots, idx, out),
                    // All senders dropped: every remaining task panicked
                    // before sending.  Fall through to the synthetic fill.
                    None => break,
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(WAIT_TICK_MS)) => {
                if interrupt.load(Ordering::SeqCst) {
                    break;
                }
            }
        }
    }

    if tracker.completed() < total {
        // Interrupted (or a task died without reporting).  Abort what is
        // still running, drain any results that raced in, then synthesize
        // the rest so the call↔result invariant holds.
        tracker.set_cancelled();
        for (idx, handle) in handles.iter_mut().enumerate() {
            if slots[idx].is_none() {
                if let Some(h) = handle.take() {
                    h.abort();
                }
            }
        }
        while let Ok((idx, out)) = rx.try_recv() {
            if slots[idx].is_none() {
                fill(&mut slots, idx, out);
            }
        }
        for (idx, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                let call = &calls[idx];
                let out = ToolOutput::err(&call.id, &call.name, "cancelled");
                let (completed, total) = tracker.complete(true);
                progress(ProgressUpdate {
                    tool_name: call.name.clone(),
                    is_error: true,
                    completed,
                    total,
                });
                *slot = Some(out);
            }
        }
        warn!(
            completed = tracker.completed(),
            errors = tracker.error_count(),
            "tool batch cancelled"
        );
    }

    // Join whatever finished normally so no task outlives the batch.
    for handle in handles.into_iter().flatten() {
        let _ = handle.await;
    }

    slots
        .into_iter()
        .map(|s| s.expect("every slot filled by completion or synthesis"))
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
