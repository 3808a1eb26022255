// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! The two bounded queues of the UI pipeline.
//!
//! Render events flow worker → renderer through the UI queue; user
//! instructions flow renderer → worker through the instruction queue.  Both
//! are plain bounded channels: `send` blocks briefly when full, receivers
//! observe `None` after shutdown (all senders dropped), and FIFO order per
//! producer is guaranteed.

use coda_core::UiEvent;
use tokio::sync::mpsc;

/// Capacity of the worker → renderer queue.
pub const UI_QUEUE_CAPACITY: usize = 256;

/// Capacity of the renderer → worker instruction queue.
pub const INSTRUCTION_QUEUE_CAPACITY: usize = 16;

pub fn ui_channel() -> (mpsc::Sender<UiEvent>, mpsc::Receiver<UiEvent>) {
    mpsc::channel(UI_QUEUE_CAPACITY)
}

pub fn instruction_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(INSTRUCTION_QUEUE_CAPACITY)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ui_queue_preserves_fifo_order() {
        let (tx, mut rx) = ui_channel();
        for i in 0..100 {
            tx.send(UiEvent::AddLine(format!("line {i}"))).await.unwrap();
        }
        for i in 0..100 {
            match rx.recv().await.unwrap() {
                UiEvent::AddLine(l) => assert_eq!(l, format!("line {i}")),
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn no_events_are_dropped_below_capacity() {
        let (tx, mut rx) = ui_channel();
        for _ in 0..UI_QUEUE_CAPACITY {
            tx.send(UiEvent::Clear).await.unwrap();
        }
        drop(tx);
        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, UI_QUEUE_CAPACITY);
    }

    #[tokio::test]
    async fn closed_queue_reports_to_producer() {
        let (tx, rx) = ui_channel();
        drop(rx);
        assert!(tx.send(UiEvent::Clear).await.is_err());
    }

    #[tokio::test]
    async fn instruction_queue_is_bounded() {
        let (tx, mut rx) = instruction_channel();
        for i in 0..INSTRUCTION_QUEUE_CAPACITY {
            tx.try_send(format!("i{i}")).unwrap();
        }
        // The queue is full now; a further non-blocking send must fail.
        assert!(tx.try_send("overflow".into()).is_err());
        assert_eq!(rx.recv().await.unwrap(), "i0");
        // One slot freed: the next try_send goes through.
        tx.try_send("fits now".into()).unwrap();
    }
}
