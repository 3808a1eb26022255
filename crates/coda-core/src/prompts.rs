// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! System prompt assembly.
//!
//! The prompt is built once per session from an environment snapshot:
//! working directories, platform, `uname -sr`, today's date, git state when
//! the working directory is a repository, and the project instruction file
//! (`CLAUDE.md`) appended under a delimited system-reminder section.

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use tracing::debug;

/// Name of the per-project instruction file picked up from the working
/// directory.
const PROJECT_INSTRUCTIONS_FILE: &str = "CLAUDE.md";

/// Git state of the working directory.
#[derive(Debug, Clone)]
pub struct GitContext {
    pub branch: String,
    pub dirty: bool,
    /// `git log --oneline` summaries, most recent first, at most five.
    pub recent_commits: Vec<String>,
}

/// Everything the prompt template needs, gathered up front so assembly
/// itself is pure and testable.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub working_dir: PathBuf,
    pub additional_dirs: Vec<PathBuf>,
    pub platform: String,
    pub os_version: String,
    pub today: String,
    pub git: Option<GitContext>,
    pub project_instructions: Option<String>,
}

/// Snapshot the environment for `working_dir`.
pub fn gather(working_dir: &Path, additional_dirs: &[PathBuf]) -> PromptContext {
    PromptContext {
        working_dir: working_dir.to_path_buf(),
        additional_dirs: additional_dirs.to_vec(),
        platform: std::env::consts::OS.to_string(),
        os_version: uname_sr().unwrap_or_else(|| "unknown".to_string()),
        today: Local::now().format("%Y-%m-%d").to_string(),
        git: git_context(working_dir),
        project_instructions: read_project_instructions(working_dir),
    }
}

/// Render the system prompt text.
pub fn assemble(ctx: &PromptContext) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(
        "You are an interactive coding agent running in a terminal. \
         You help with software engineering tasks by reading and editing \
         files, running shell commands, and searching the codebase with the \
         tools provided. Keep answers concise; use tools instead of \
         guessing.\n\n# Environment\n",
    );
    out.push_str(&format!("Working directory: {}\n", ctx.working_dir.display()));
    for dir in &ctx.additional_dirs {
        out.push_str(&format!("Additional directory: {}\n", dir.display()));
    }
    out.push_str(&format!("Platform: {}\n", ctx.platform));
    out.push_str(&format!("OS version: {}\n", ctx.os_version));
    out.push_str(&format!("Today's date: {}\n", ctx.today));

    if let Some(git) = &ctx.git {
        out.push_str("\n# Git\n");
        out.push_str(&format!(
            "Branch: {} ({})\n",
            git.branch,
            if git.dirty { "modified" } else { "clean" }
        ));
        if !git.recent_commits.is_empty() {
            out.push_str("Recent commits:\n");
            for c in &git.recent_commits {
                out.push_str(&format!("  {c}\n"));
            }
        }
    }

    if let Some(instructions) = &ctx.project_instructions {
        out.push_str("\n<system-reminder>\n");
        out.push_str(&format!(
            "Project instructions from {PROJECT_INSTRUCTIONS_FILE}:\n\n"
        ));
        out.push_str(instructions);
        if !instructions.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("</system-reminder>\n");
    }

    out
}

fn uname_sr() -> Option<String> {
    let output = Command::new("uname").arg("-sr").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn git_context(working_dir: &Path) -> Option<GitContext> {
    let branch = git(working_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let dirty = git(working_dir, &["status", "--porcelain"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let recent_commits = git(working_dir, &["log", "--oneline", "-5"])
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default();
    debug!(branch = %branch, dirty, "git context gathered");
    Some(GitContext { branch, dirty, recent_commits })
}

/// Run one git command in `working_dir`; `None` on any failure (not a
/// repository, git missing).
fn git(working_dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(working_dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

fn read_project_instructions(working_dir: &Path) -> Option<String> {
    let path = working_dir.join(PROJECT_INSTRUCTIONS_FILE);
    std::fs::read_to_string(path).ok().filter(|s| !s.trim().is_empty())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
