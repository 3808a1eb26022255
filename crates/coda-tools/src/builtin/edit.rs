// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use regex::{NoExpand, Regex};
use serde_json::{json, Value};
use tracing::debug;

use crate::context::ToolContext;
use crate::events::ToolEvent;
use crate::patch;
use crate::resolve::resolve_path;
use crate::tool::{Tool, ToolCall};

/// Which match to use when an anchor appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occurrence {
    First,
    Last,
    Nth(usize),
}

pub struct EditTool {
    ctx: Arc<ToolContext>,
}

impl EditTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "Edit"
    }

    fn description(&self) -> &str {
        "Edit a file in place. Three modes:\n\
         1. String replace (default): replace the first occurrence of\n\
            old_string with new_string; replace_all=true replaces every one.\n\
         2. Regex replace: use_regex=true treats old_string as a regular\n\
            expression.\n\
         3. Insert: insert_mode=true splices new_string before or after an\n\
            anchor (insert_position, default after). anchor_is_regex treats\n\
            the anchor as a pattern; occurrence picks which match (\"first\",\n\
            \"last\", or a 1-based number; default last); fallback_to_eof\n\
            appends at end of file when the anchor is missing.\n\
         The edit fails, changing nothing, when the target is not found."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": { "type": "string", "description": "File to edit" },
                "old_string": { "type": "string", "description": "Text or pattern to replace" },
                "new_string": { "type": "string", "description": "Replacement or inserted text" },
                "replace_all": { "type": "boolean", "description": "Replace every occurrence (default false)" },
                "use_regex": { "type": "boolean", "description": "Treat old_string as a regex (default false)" },
                "insert_mode": { "type": "boolean", "description": "Insert relative to an anchor instead of replacing" },
                "anchor": { "type": "string", "description": "Anchor text for insert_mode" },
                "anchor_is_regex": { "type": "boolean", "description": "Treat anchor as a regex (default false)" },
                "insert_position": { "type": "string", "enum": ["before", "after"], "description": "Side of the anchor (default after)" },
                "occurrence": { "description": "\"first\", \"last\", or a 1-based match number (default last)" },
                "fallback_to_eof": { "type": "boolean", "description": "Append at EOF when the anchor is missing" }
            },
            "required": ["file_path", "new_string"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let file_path = match call.parameters.get("file_path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return json!({ "error": "missing required parameter 'file_path'" }),
        };
        let new_string = match call.parameters.get("new_string").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return json!({ "error": "missing required parameter 'new_string'" }),
        };

        // A patch envelope passed through new_string takes over entirely.
        if patch::is_patch_envelope(&new_string) {
            return patch::apply_patch(&self.ctx, &new_string).await;
        }

        let path = resolve_path(&self.ctx.working_dir, &file_path);
        let old_content = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) => return json!({ "error": format!("cannot read {}: {e}", path.display()) }),
        };

        let insert_mode = flag(&call.parameters, "insert_mode");
        let use_regex = flag(&call.parameters, "use_regex");
        let replace_all = flag(&call.parameters, "replace_all");

        debug!(path = %path.display(), insert_mode, use_regex, replace_all, "Edit tool");

        let edited = if insert_mode {
            apply_insert(&call.parameters, &old_content, &new_string)
        } else {
            apply_replace(&call.parameters, &old_content, &new_string, use_regex, replace_all)
        };

        let (new_content, replacements) = match edited {
            Ok(pair) => pair,
            Err(e) => return e,
        };

        if let Err(e) = tokio::fs::write(&path, &new_content).await {
            return json!({ "error": format!("cannot write {}: {e}", path.display()) });
        }

        let diff = super::unified_diff(&file_path, &old_content, &new_content);
        self.ctx.post_event(ToolEvent::Diff { path: file_path, diff });

        json!({ "status": "success", "replacements": replacements })
    }
}

fn flag(params: &Value, key: &str) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
}

// ── Insert mode ───────────────────────────────────────────────────────────────

fn apply_insert(
    params: &Value,
    content: &str,
    new_string: &str,
) -> Result<(String, usize), Value> {
    let anchor = match params.get("anchor").and_then(|v| v.as_str()) {
        Some(a) if !a.is_empty() => a,
        _ => return Err(json!({ "error": "insert_mode requires a non-empty 'anchor'" })),
    };
    let position = params
        .get("insert_position")
        .and_then(|v| v.as_str())
        .unwrap_or("after");
    if position != "before" && position != "after" {
        return Err(json!({ "error": format!("insert_position must be 'before' or 'after', got '{position}'") }));
    }
    let occurrence = parse_occurrence(params.get("occurrence"))?;

    // Splicing works on the content with its final newline stripped, so an
    // anchor on the last line takes the insertion in place of that newline
    // rather than leaving a stray blank line; the newline is restored below
    // unless the inserted text already supplies one.
    let (work, stripped) = match content.strip_suffix('\n') {
        Some(w) => (w, true),
        None => (content, false),
    };

    let matches: Vec<(usize, usize)> = if flag(params, "anchor_is_regex") {
        let re = compile(anchor)?;
        re.find_iter(work).map(|m| (m.start(), m.end())).collect()
    } else {
        work.match_indices(anchor)
            .map(|(start, _)| (start, start + anchor.len()))
            .collect()
    };

    if matches.is_empty() {
        if flag(params, "fallback_to_eof") {
            // EOF fallback appends to the untouched content.
            return Ok((format!("{content}{new_string}"), 1));
        }
        return Err(json!({ "error": format!("Anchor not found: {anchor}") }));
    }

    let (start, end) = match occurrence {
        Occurrence::First => matches[0],
        Occurrence::Last => matches[matches.len() - 1],
        Occurrence::Nth(n) => match matches.get(n - 1) {
            Some(m) => *m,
            None => {
                return Err(json!({
                    "error": format!("occurrence {n} out of range ({} matches)", matches.len())
                }))
            }
        },
    };

    let at = if position == "before" { start } else { end };
    let mut out = String::with_capacity(content.len() + new_string.len());
    out.push_str(&work[..at]);
    out.push_str(new_string);
    out.push_str(&work[at..]);
    if stripped && !out.ends_with('\n') {
        out.push('\n');
    }
    Ok((out, 1))
}

/// `occurrence` accepts "first", "last", or an integer; any integer ≤ 0
/// means "last".
fn parse_occurrence(v: Option<&Value>) -> Result<Occurrence, Value> {
    match v {
        None | Some(Value::Null) => Ok(Occurrence::Last),
        Some(Value::String(s)) => match s.as_str() {
            "first" => Ok(Occurrence::First),
            "last" => Ok(Occurrence::Last),
            other => Err(json!({ "error": format!("invalid occurrence '{other}'") })),
        },
        Some(n) => match n.as_i64() {
            Some(i) if i <= 0 => Ok(Occurrence::Last),
            Some(i) => Ok(Occurrence::Nth(i as usize)),
            None => Err(json!({ "error": "occurrence must be a string or integer" })),
        },
    }
}

// ── Replace modes ─────────────────────────────────────────────────────────────

fn apply_replace(
    params: &Value,
    content: &str,
    new_string: &str,
    use_regex: bool,
    replace_all: bool,
) -> Result<(String, usize), Value> {
    let old_string = match params.get("old_string").and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s,
        Some(_) => return Err(json!({ "error": "old_string must not be empty" })),
        None => return Err(json!({ "error": "old_string is required unless insert_mode is set" })),
    };

    if use_regex {
        let re = compile(old_string)?;
        let count = re.find_iter(content).count();
        if count == 0 {
            return Err(json!({ "error": format!("Pattern not found: {old_string}") }));
        }
        // NoExpand: replacement text is taken literally, `$` has no capture
        // semantics.
        let (out, n) = if replace_all {
            (re.replace_all(content, NoExpand(new_string)).into_owned(), count)
        } else {
            (re.replace(content, NoExpand(new_string)).into_owned(), 1)
        };
        Ok((out, n))
    } else {
        let count = content.matches(old_string).count();
        if count == 0 {
            return Err(json!({ "error": format!("String not found: {old_string}") }));
        }
        let (out, n) = if replace_all {
            (content.replace(old_string, new_string), count)
        } else {
            (content.replacen(old_string, new_string, 1), 1)
        };
        Ok((out, n))
    }
}

fn compile(pattern: &str) -> Result<Regex, Value> {
    Regex::new(pattern).map_err(|e| json!({ "error": format!("invalid regex '{pattern}': {e}") }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
