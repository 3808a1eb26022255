// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::resolve::resolve_path;
use crate::tool::{Tool, ToolCall};

/// Interval (in scanned lines) at which the walk re-checks the interrupt
/// flag.
const CANCEL_CHECK_LINES: usize = 1000;

/// File extensions that are never worth scanning as text.
const BINARY_EXTENSIONS: &[&str] = &[
    "o", "a", "so", "elf", "exe", "dll", "wasm", "bin", "obj", "lib",
    "zip", "gz", "tar", "bz2", "xz", "7z", "zst", "jar", "class", "pyc",
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "ico", "pdf",
    "mp3", "mp4", "ogg", "wav", "woff", "woff2", "ttf",
];

pub struct GrepTool {
    ctx: Arc<ToolContext>,
}

impl GrepTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "Grep"
    }

    fn description(&self) -> &str {
        "Search file contents for a regular expression.\n\
         Without 'path', the search covers the working directory and every\n\
         additional directory recursively. VCS metadata, dependency caches,\n\
         build artifacts, and binary files are skipped.\n\
         Matches are reported as file:line:text. Results are truncated at a\n\
         configurable cap; narrow the pattern or pass 'path' to see more."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to restrict the search to"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let pattern = match call.parameters.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return json!({ "error": "missing required parameter 'pattern'" }),
        };
        let re = match Regex::new(&pattern) {
            Ok(r) => r,
            Err(e) => return json!({ "error": format!("invalid regex '{pattern}': {e}") }),
        };

        let roots: Vec<PathBuf> = match call.parameters.get("path").and_then(|v| v.as_str()) {
            Some(p) => vec![resolve_path(&self.ctx.working_dir, p)],
            None => self.ctx.search_roots(),
        };
        let cap = self.ctx.grep_max_results;
        let interrupt = Arc::clone(&self.ctx.interrupt);

        debug!(pattern = %pattern, roots = roots.len(), cap, "Grep tool");

        let result =
            tokio::task::spawn_blocking(move || scan(&roots, &re, cap, &interrupt)).await;
        match result {
            Ok(v) => v,
            Err(e) => json!({ "error": format!("grep walk failed: {e}") }),
        }
    }
}

fn scan(roots: &[PathBuf], re: &Regex, cap: usize, interrupt: &AtomicBool) -> Value {
    let mut matches: Vec<String> = Vec::new();
    let mut lines_scanned: usize = 0;
    let mut truncated = false;
    let mut cancelled = false;

    'roots: for root in roots {
        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e.path()))
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() || is_binary_path(entry.path()) {
                continue;
            }
            let bytes = match std::fs::read(entry.path()) {
                Ok(b) => b,
                Err(_) => continue,
            };
            // NUL in the first block means binary content regardless of
            // extension.
            if bytes[..bytes.len().min(4096)].contains(&0u8) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            for (lineno, line) in text.lines().enumerate() {
                lines_scanned += 1;
                if lines_scanned % CANCEL_CHECK_LINES == 0 && interrupt.load(Ordering::SeqCst) {
                    cancelled = true;
                    break 'roots;
                }
                if re.is_match(line) {
                    if matches.len() >= cap {
                        truncated = true;
                        break 'roots;
                    }
                    matches.push(format!("{}:{}:{}", entry.path().display(), lineno + 1, line));
                }
            }
        }
    }

    let mut out = json!({ "matches": matches, "match_count": matches.len() });
    if cancelled {
        out["warning"] = json!("search cancelled");
    } else if truncated {
        out["warning"] = json!(format!("results truncated at {cap} matches"));
    }
    out
}

fn is_excluded_dir(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(".git") | Some(".svn") | Some(".hg") | Some("node_modules") | Some("target")
            | Some("build") | Some("dist") | Some("__pycache__") | Some(".venv") | Some("venv")
            | Some(".cache")
    )
}

fn is_binary_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| BINARY_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
