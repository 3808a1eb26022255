// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::events::{TodoItem, ToolEvent};

/// Shared state handed to every tool at registration time.
///
/// Tools keep an `Arc<ToolContext>`; nothing here is mutated except the todo
/// list (under its mutex) and the interrupt flag (atomic), so parallel tool
/// execution needs no further coordination.
pub struct ToolContext {
    /// Primary working directory; relative tool paths resolve against it.
    pub working_dir: PathBuf,
    /// Additional search roots for Glob/Grep.  Deduplicated, canonicalized,
    /// and never equal to `working_dir`.
    pub additional_dirs: Vec<PathBuf>,
    /// Raised by the input handler on Ctrl+C; tools poll it at cooperative
    /// points.
    pub interrupt: Arc<AtomicBool>,
    /// Session todo list, replaced wholesale by the TodoWrite tool.  Shared
    /// as an `Arc` so the conversation owner can clear it alongside the
    /// message history.
    pub todos: Arc<Mutex<Vec<TodoItem>>>,
    /// Default Bash timeout in seconds; 0 disables.
    pub bash_timeout_secs: u64,
    /// Grep match cap before truncation.
    pub grep_max_results: usize,
    /// Out-of-band channel for diffs and todo updates shown in the UI.
    events: mpsc::Sender<ToolEvent>,
}

impl ToolContext {
    pub fn new(
        working_dir: PathBuf,
        additional_dirs: Vec<PathBuf>,
        interrupt: Arc<AtomicBool>,
        events: mpsc::Sender<ToolEvent>,
        bash_timeout_secs: u64,
        grep_max_results: usize,
    ) -> Self {
        let working_canonical = working_dir.canonicalize().unwrap_or_else(|_| working_dir.clone());
        let additional_dirs = normalize_dirs(additional_dirs, &working_canonical);
        Self {
            working_dir: working_canonical,
            additional_dirs,
            interrupt,
            todos: Arc::new(Mutex::new(Vec::new())),
            bash_timeout_secs,
            grep_max_results,
            events,
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// All directories a multi-root search covers, working dir first.
    pub fn search_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.additional_dirs.len() + 1);
        roots.push(self.working_dir.clone());
        roots.extend(self.additional_dirs.iter().cloned());
        roots
    }

    /// Post a tool event without blocking; a full or closed channel drops
    /// the event (display-only data, never load-bearing).
    pub fn post_event(&self, event: ToolEvent) {
        if let Err(e) = self.events.try_send(event) {
            warn!(error = %e, "dropping tool event");
        }
    }
}

/// Canonicalize, deduplicate, and drop entries equal to the working dir.
fn normalize_dirs(dirs: Vec<PathBuf>, working_dir: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for d in dirs {
        let canonical = match d.canonicalize() {
            Ok(c) => c,
            Err(e) => {
                warn!(dir = %d.display(), error = %e, "skipping additional directory");
                continue;
            }
        };
        if canonical == working_dir || out.contains(&canonical) {
            continue;
        }
        out.push(canonical);
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with_dirs(working: &Path, extra: Vec<PathBuf>) -> ToolContext {
        let (tx, _rx) = mpsc::channel(8);
        ToolContext::new(
            working.to_path_buf(),
            extra,
            Arc::new(AtomicBool::new(false)),
            tx,
            30,
            100,
        )
    }

    #[test]
    fn duplicate_additional_dirs_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        let ctx = ctx_with_dirs(
            tmp.path(),
            vec![extra.path().to_path_buf(), extra.path().to_path_buf()],
        );
        assert_eq!(ctx.additional_dirs.len(), 1);
    }

    #[test]
    fn additional_dir_equal_to_working_dir_is_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_with_dirs(tmp.path(), vec![tmp.path().to_path_buf()]);
        assert!(ctx.additional_dirs.is_empty());
    }

    #[test]
    fn nonexistent_additional_dir_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_with_dirs(tmp.path(), vec![PathBuf::from("/no/such/dir/xyz")]);
        assert!(ctx.additional_dirs.is_empty());
    }

    #[test]
    fn search_roots_start_with_working_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        let ctx = ctx_with_dirs(tmp.path(), vec![extra.path().to_path_buf()]);
        let roots = ctx.search_roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0], ctx.working_dir);
    }

    #[test]
    fn interrupted_follows_the_flag() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = ctx_with_dirs(tmp.path(), vec![]);
        assert!(!ctx.interrupted());
        ctx.interrupt.store(true, Ordering::SeqCst);
        assert!(ctx.interrupted());
    }
}
