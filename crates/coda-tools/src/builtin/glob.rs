// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use crate::context::ToolContext;
use crate::tool::{Tool, ToolCall};

/// Built-in tool for recursive file search using glob patterns.
pub struct GlobTool {
    ctx: Arc<ToolContext>,
}

impl GlobTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "Glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern. The pattern is expanded against\n\
         the working directory and every additional directory; results are\n\
         concatenated and sorted. A pattern without '/' matches file names at\n\
         any depth (*.rs finds every Rust file); a pattern with '/' matches\n\
         the path relative to each search root (src/**/*.rs).\n\
         VCS metadata and dependency/build caches are excluded.\n\
         For content search use Grep."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern, e.g. '*.rs' or 'src/**/*.rs'"
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
        debug!(pattern = %pattern, "Glob tool");

        let matcher = match glob_to_regex(&pattern) {
            Ok(m) => m,
            Err(e) => return json!({ "error": e }),
        };
        let by_name = !pattern.contains('/');

        let roots = self.ctx.search_roots();
        let result = tokio::task::spawn_blocking(move || {
            let mut files: Vec<String> = Vec::new();
            for root in &roots {
                for entry in WalkDir::new(root)
                    .follow_links(false)
                    .into_iter()
                    .filter_entry(|e| !is_excluded_dir(e.path()))
                    .filter_map(Result::ok)
                {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let candidate = if by_name {
                        entry.file_name().to_string_lossy().into_owned()
                    } else {
                        match entry.path().strip_prefix(root) {
                            Ok(rel) => rel.to_string_lossy().into_owned(),
                            Err(_) => continue,
                        }
                    };
                    if matcher.is_match(&candidate) {
                        files.push(entry.path().to_string_lossy().into_owned());
                    }
                }
            }
            files.sort();
            files
        })
        .await;

        match result {
            Ok(files) => json!({ "count": files.len(), "files": files }),
            Err(e) => json!({ "error": format!("glob walk failed: {e}") }),
        }
    }
}

/// Directory names never descended into.
fn is_excluded_dir(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some(".git") | Some(".svn") | Some(".hg") | Some("node_modules") | Some("target")
            | Some("__pycache__") | Some(".venv") | Some("venv") | Some(".cache")
    )
}

/// Translate a shell glob into an anchored regex.
///
/// `**` crosses directory separators, `*` and `?` do not.
fn glob_to_regex(pattern: &str) -> Result<Regex, String> {
    let mut re = String::with_capacity(pattern.len() * 2 + 2);
    re.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    // Swallow a separator following `**` so `**/*.rs` also
                    // matches files at the root level.
                    if chars.peek() == Some(&'/') {
                        chars.next();
                        re.push_str("(?:.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                re.push('\\');
                re.push(c);
            }
            other => re.push(other),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| format!("invalid glob pattern '{pattern}': {e}"))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
