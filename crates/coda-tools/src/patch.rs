// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Multi-file patch envelope recognized by the Write and Edit tools.
//!
//! The envelope frames per-file sections between `*** Begin Patch` and
//! `*** End Patch`:
//!
//! ```text
//! *** Begin Patch
//! *** Update File: src/lib.rs
//! @@ fn main
//!  context line
//! -removed line
//! +added line
//! *** Add File: notes.txt
//! +first line
//! *** Delete File: obsolete.txt
//! *** End Patch
//! ```
//!
//! Detection is a cheap marker check (`is_patch_envelope`); hunks are
//! located by exact context match and spliced in place.

use serde_json::{json, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::events::ToolEvent;
use crate::resolve::resolve_path;

const BEGIN_MARKER: &str = "*** Begin Patch";
const END_MARKER: &str = "*** End Patch";

/// Cheap detection used by Write/Edit before delegating here.
pub fn is_patch_envelope(content: &str) -> bool {
    content.trim_start().starts_with(BEGIN_MARKER)
}

#[derive(Debug, Clone, PartialEq)]
enum HunkLine {
    Context(String),
    Del(String),
    Add(String),
}

#[derive(Debug, Clone)]
struct Hunk {
    lines: Vec<HunkLine>,
}

impl Hunk {
    /// Lines that must already exist in the file (Context + Del), in order.
    fn search_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter_map(|l| match l {
                HunkLine::Context(s) | HunkLine::Del(s) => Some(s.as_str()),
                HunkLine::Add(_) => None,
            })
            .collect()
    }
}

#[derive(Debug)]
enum FileOp {
    Add { path: String, content: String },
    Update { path: String, hunks: Vec<Hunk> },
    Delete { path: String },
}

/// Apply a patch envelope against the working directory.
///
/// Returns `{"status":"success","files_changed":n}` or an `"error"` object.
/// The exact parse-failure message is part of the tool contract.
pub async fn apply_patch(ctx: &ToolContext, content: &str) -> Value {
    let ops = match parse(content) {
        Ok(ops) => ops,
        Err(detail) => {
            debug!(detail = %detail, "patch parse failed");
            return json!({ "error": "Failed to parse patch format" });
        }
    };

    let mut files_changed = 0usize;
    for op in ops {
        match op {
            FileOp::Add { path, content } => {
                let resolved = resolve_path(&ctx.working_dir, &path);
                if let Some(parent) = resolved.parent() {
                    if !parent.as_os_str().is_empty() {
                        if let Err(e) = tokio::fs::create_dir_all(parent).await {
                            return json!({ "error": format!("cannot create {}: {e}", parent.display()) });
                        }
                    }
                }
                if let Err(e) = tokio::fs::write(&resolved, &content).await {
                    return json!({ "error": format!("cannot write {}: {e}", resolved.display()) });
                }
                files_changed += 1;
            }
            FileOp::Delete { path } => {
                let resolved = resolve_path(&ctx.working_dir, &path);
                if let Err(e) = tokio::fs::remove_file(&resolved).await {
                    return json!({ "error": format!("cannot delete {}: {e}", resolved.display()) });
                }
                files_changed += 1;
            }
            FileOp::Update { path, hunks } => {
                let resolved = resolve_path(&ctx.working_dir, &path);
                let old = match tokio::fs::read_to_string(&resolved).await {
                    Ok(s) => s,
                    Err(e) => return json!({ "error": format!("cannot read {}: {e}", resolved.display()) }),
                };
                let mut lines: Vec<String> = old.lines().map(str::to_string).collect();
                for hunk in &hunks {
                    match apply_hunk(&lines, hunk) {
                        Ok(updated) => lines = updated,
                        Err(e) => return json!({ "error": format!("{path}: {e}") }),
                    }
                }
                let mut new = lines.join("\n");
                if old.ends_with('\n') {
                    new.push('\n');
                }
                if let Err(e) = tokio::fs::write(&resolved, &new).await {
                    return json!({ "error": format!("cannot write {}: {e}", resolved.display()) });
                }
                let diff = crate::builtin::unified_diff(&path, &old, &new);
                ctx.post_event(ToolEvent::Diff { path: path.clone(), diff });
                files_changed += 1;
            }
        }
    }

    json!({ "status": "success", "files_changed": files_changed })
}

fn parse(content: &str) -> Result<Vec<FileOp>, String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while i < lines.len() && lines[i].trim_end() != BEGIN_MARKER {
        if !lines[i].trim().is_empty() {
            return Err(format!("unexpected content before begin marker: {}", lines[i]));
        }
        i += 1;
    }
    if i == lines.len() {
        return Err("missing begin marker".into());
    }
    i += 1;

    let mut ops: Vec<FileOp> = Vec::new();
    let mut saw_end = false;

    while i < lines.len() {
        let line = lines[i].trim_end();
        if line == END_MARKER {
            saw_end = true;
            break;
        }
        if let Some(path) = line.strip_prefix("*** Add File: ") {
            i += 1;
            let mut body: Vec<&str> = Vec::new();
            while i < lines.len() && !lines[i].trim_end().starts_with("*** ") {
                match lines[i].strip_prefix('+') {
                    Some(rest) => body.push(rest),
                    None => return Err(format!("add-file line without '+' prefix: {}", lines[i])),
                }
                i += 1;
            }
            let mut content = body.join("\n");
            if !content.is_empty() {
                content.push('\n');
            }
            ops.push(FileOp::Add { path: path.trim().to_string(), content });
        } else if let Some(path) = line.strip_prefix("*** Delete File: ") {
            ops.push(FileOp::Delete { path: path.trim().to_string() });
            i += 1;
        } else if let Some(path) = line.strip_prefix("*** Update File: ") {
            i += 1;
            let mut hunks: Vec<Hunk> = Vec::new();
            let mut current: Option<Hunk> = None;
            while i < lines.len() && !lines[i].trim_end().starts_with("*** ") {
                let l = lines[i];
                if l.starts_with("@@") {
                    if let Some(h) = current.take() {
                        if !h.lines.is_empty() {
                            hunks.push(h);
                        }
                    }
                    current = Some(Hunk { lines: Vec::new() });
                } else {
                    let h = current
                        .as_mut()
                        .ok_or_else(|| format!("hunk line before @@ header: {l}"))?;
                    if let Some(rest) = l.strip_prefix('-') {
                        h.lines.push(HunkLine::Del(rest.to_string()));
                    } else if let Some(rest) = l.strip_prefix('+') {
                        h.lines.push(HunkLine::Add(rest.to_string()));
                    } else if let Some(rest) = l.strip_prefix(' ') {
                        h.lines.push(HunkLine::Context(rest.to_string()));
                    } else if l.is_empty() {
                        h.lines.push(HunkLine::Context(String::new()));
                    } else {
                        return Err(format!("unrecognized hunk line: {l}"));
                    }
                }
                i += 1;
            }
            if let Some(h) = current.take() {
                if !h.lines.is_empty() {
                    hunks.push(h);
                }
            }
            if hunks.is_empty() {
                return Err(format!("update section for {path} has no hunks"));
            }
            ops.push(FileOp::Update { path: path.trim().to_string(), hunks });
        } else if line.trim().is_empty() {
            i += 1;
        } else {
            return Err(format!("unrecognized patch line: {line}"));
        }
    }

    if !saw_end {
        return Err("missing end marker".into());
    }
    if ops.is_empty() {
        return Err("empty patch".into());
    }
    Ok(ops)
}

/// Locate the hunk's search lines in the file by exact match and splice.
fn apply_hunk(file_lines: &[String], hunk: &Hunk) -> Result<Vec<String>, String> {
    let search = hunk.search_lines();

    // A hunk with no context or deletions is a pure insertion at EOF.
    let pos = if search.is_empty() {
        file_lines.len()
    } else {
        let n = search.len();
        if file_lines.len() < n {
            return Err("context not found (file shorter than hunk)".into());
        }
        (0..=(file_lines.len() - n))
            .find(|&i| {
                file_lines[i..i + n]
                    .iter()
                    .map(String::as_str)
                    .eq(search.iter().copied())
            })
            .ok_or_else(|| format!("context not found:\n{}", search.join("\n")))?
    };

    let mut result: Vec<String> = file_lines[..pos].to_vec();
    let mut file_idx = pos;
    for hl in &hunk.lines {
        match hl {
            HunkLine::Context(_) => {
                result.push(file_lines[file_idx].clone());
                file_idx += 1;
            }
            HunkLine::Del(_) => {
                file_idx += 1;
            }
            HunkLine::Add(s) => {
                result.push(s.clone());
            }
        }
    }
    result.extend_from_slice(&file_lines[file_idx..]);
    Ok(result)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
