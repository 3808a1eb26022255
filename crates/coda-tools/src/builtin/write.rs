// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::events::ToolEvent;
use crate::patch;
use crate::resolve::resolve_path;
use crate::tool::{Tool, ToolCall};

pub struct WriteTool {
    ctx: Arc<ToolContext>,
}

impl WriteTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Write a file to the local filesystem, overwriting any existing file\n\
         at that path. Parent directories are created automatically.\n\
         ALWAYS prefer Edit for modifying existing files.\n\
         When 'content' is a patch envelope (*** Begin Patch), it is applied\n\
         as a multi-file patch instead and 'file_path' is ignored."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or working-directory-relative path"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["file_path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let content = match call.parameters.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return json!({ "error": "missing required parameter 'content'" }),
        };

        // A patch envelope takes over the whole operation.
        if patch::is_patch_envelope(&content) {
            return patch::apply_patch(&self.ctx, &content).await;
        }

        let file_path = match call.parameters.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return json!({ "error": "missing required parameter 'file_path'" }),
        };
        let path = resolve_path(&self.ctx.working_dir, &file_path);
        debug!(path = %path.display(), bytes = content.len(), "Write tool");

        // Snapshot previous content for the diff preview.
        let previous = tokio::fs::read_to_string(&path).await.ok();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return json!({ "error": format!("cannot create {}: {e}", parent.display()) });
                }
            }
        }
        if let Err(e) = tokio::fs::write(&path, &content).await {
            return json!({ "error": format!("cannot write {}: {e}", path.display()) });
        }

        if let Some(old) = previous {
            let diff = super::unified_diff(&file_path, &old, &content);
            self.ctx.post_event(ToolEvent::Diff { path: file_path, diff });
        }

        json!({ "status": "success" })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn test_ctx() -> (Arc<ToolContext>, tempfile::TempDir, mpsc::Receiver<ToolEvent>) {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel(8);
        let ctx = Arc::new(ToolContext::new(
            tmp.path().to_path_buf(),
            vec![],
            Arc::new(AtomicBool::new(false)),
            tx,
            30,
            100,
        ));
        (ctx, tmp, rx)
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "w1".into(), name: "Write".into(), parameters: args }
    }

    #[tokio::test]
    async fn creates_new_file() {
        let (ctx, tmp, _rx) = test_ctx();
        let out = WriteTool::new(ctx)
            .execute(&call(json!({"file_path": "out.txt", "content": "data"})))
            .await;
        assert_eq!(out["status"], "success");
        assert_eq!(std::fs::read_to_string(tmp.path().join("out.txt")).unwrap(), "data");
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let (ctx, tmp, _rx) = test_ctx();
        let out = WriteTool::new(ctx)
            .execute(&call(json!({"file_path": "a/b/c.txt", "content": "nested"})))
            .await;
        assert_eq!(out["status"], "success");
        assert!(tmp.path().join("a/b/c.txt").exists());
    }

    #[tokio::test]
    async fn overwrite_emits_diff_event() {
        let (ctx, tmp, mut rx) = test_ctx();
        std::fs::write(tmp.path().join("f.txt"), "old\n").unwrap();
        let out = WriteTool::new(ctx)
            .execute(&call(json!({"file_path": "f.txt", "content": "new\n"})))
            .await;
        assert_eq!(out["status"], "success");
        match rx.try_recv() {
            Ok(ToolEvent::Diff { diff, .. }) => {
                assert!(diff.contains("-old"));
                assert!(diff.contains("+new"));
            }
            other => panic!("expected Diff event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fresh_file_emits_no_diff() {
        let (ctx, _tmp, mut rx) = test_ctx();
        WriteTool::new(ctx)
            .execute(&call(json!({"file_path": "fresh.txt", "content": "x"})))
            .await;
        assert!(rx.try_recv().is_err(), "no diff for a file that did not exist");
    }

    #[tokio::test]
    async fn patch_envelope_is_delegated() {
        let (ctx, tmp, _rx) = test_ctx();
        let envelope = "*** Begin Patch\n*** Add File: from_patch.txt\n+hi\n*** End Patch\n";
        let out = WriteTool::new(ctx)
            .execute(&call(json!({"file_path": "ignored.txt", "content": envelope})))
            .await;
        assert_eq!(out["status"], "success", "{out}");
        assert!(tmp.path().join("from_patch.txt").exists());
        assert!(!tmp.path().join("ignored.txt").exists());
    }

    #[tokio::test]
    async fn malformed_patch_reports_contract_error() {
        let (ctx, _tmp, _rx) = test_ctx();
        let out = WriteTool::new(ctx)
            .execute(&call(json!({
                "file_path": "x.txt",
                "content": "*** Begin Patch\nbroken\n*** End Patch\n"
            })))
            .await;
        assert_eq!(out["error"], "Failed to parse patch format");
    }

    #[tokio::test]
    async fn missing_parameters_are_errors() {
        let (ctx, _tmp, _rx) = test_ctx();
        let tool = WriteTool::new(ctx);
        let out = tool.execute(&call(json!({"content": "x"}))).await;
        assert!(out["error"].as_str().unwrap().contains("file_path"));
        let out = tool.execute(&call(json!({"file_path": "x.txt"}))).await;
        assert!(out["error"].as_str().unwrap().contains("content"));
    }
}
