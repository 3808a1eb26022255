// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use similar::TextDiff;

use crate::{ToolContext, ToolRegistry};

mod bash;
mod edit;
mod glob;
mod grep;
mod mcp;
mod read;
mod sleep;
mod todo_write;
mod write;

pub use bash::BashTool;
pub use edit::EditTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use mcp::{register_mcp_tools, DisconnectedMcpHandler, McpHandler, McpProxyTool};
pub use read::ReadTool;
pub use sleep::SleepTool;
pub use todo_write::TodoWriteTool;
pub use write::WriteTool;

/// Register every built-in tool against one shared context.
pub fn register_builtin(registry: &mut ToolRegistry, ctx: &Arc<ToolContext>) {
    registry.register(BashTool::new(Arc::clone(ctx)));
    registry.register(ReadTool::new(Arc::clone(ctx)));
    registry.register(WriteTool::new(Arc::clone(ctx)));
    registry.register(EditTool::new(Arc::clone(ctx)));
    registry.register(GlobTool::new(Arc::clone(ctx)));
    registry.register(GrepTool::new(Arc::clone(ctx)));
    registry.register(TodoWriteTool::new(Arc::clone(ctx)));
    registry.register(SleepTool::new(Arc::clone(ctx)));
}

/// Render a unified diff between two file versions for UI display.
pub(crate) fn unified_diff(path: &str, old: &str, new: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{path}"), &format!("b/{path}"))
        .to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn register_builtin_exposes_the_full_tool_set() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let ctx = Arc::new(ToolContext::new(
            tmp.path().to_path_buf(),
            vec![],
            Arc::new(AtomicBool::new(false)),
            tx,
            30,
            100,
        ));
        let mut reg = ToolRegistry::new();
        register_builtin(&mut reg, &ctx);
        let names = reg.names();
        for expected in ["Bash", "Read", "Write", "Edit", "Glob", "Grep", "TodoWrite", "Sleep"] {
            assert!(names.contains(&expected.to_string()), "missing {expected}: {names:?}");
        }
    }

    #[test]
    fn unified_diff_contains_change_markers() {
        let d = unified_diff("f.txt", "a\nb\n", "a\nc\n");
        assert!(d.contains("a/f.txt"));
        assert!(d.contains("b/f.txt"));
        assert!(d.contains("-b"));
        assert!(d.contains("+c"));
    }
}
