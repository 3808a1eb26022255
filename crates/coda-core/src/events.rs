// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
/// Render events posted by the AI worker and drained by the single-threaded
/// UI loop.  All user-visible output funnels through this type while the
/// TUI is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Append one line to the transcript pane.
    AddLine(String),
    /// Replace the status line.
    Status(String),
    /// Session counters shown alongside the status (the model name itself is
    /// static and known to the renderer from construction).
    Stats {
        /// Tool executions completed since session start, synthetic results
        /// included.
        tools_completed: usize,
    },
    /// Show an error line (rendered distinctly from normal output).
    Error(String),
    /// Clear the transcript pane.
    Clear,
}
