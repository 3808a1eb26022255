// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(unix)]
use libc;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::context::ToolContext;
use crate::tool::{Tool, ToolCall};

/// Exit code reported when the command was killed by the timeout.
const TIMEOUT_EXIT_CODE: i64 = -2;

/// Grace period between SIGTERM and SIGKILL when tearing down the process
/// group.
const KILL_GRACE_MS: u64 = 100;

/// Interval of the supervision loop: interrupt and deadline checks.
const POLL_MS: u64 = 100;

/// Built-in tool that runs a shell command.
pub struct BashTool {
    ctx: Arc<ToolContext>,
}

impl BashTool {
    pub fn new(ctx: Arc<ToolContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "Bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its combined stdout and stderr.\n\
         'command' is required and may be any shell one-liner.\n\
         'timeout' overrides the default timeout in seconds; 0 disables it.\n\
         The command runs in its own process group; on timeout the whole\n\
         group is terminated and exit_code is reported as -2.\n\
         Prefer non-interactive commands; avoid anything that needs a TTY.\n\
         Do NOT use the shell for file operations:\n\
         - Read files  → use Read  (not cat / head / tail)\n\
         - Search text → use Grep  (not grep / rg)\n\
         - Find files  → use Glob  (not find / ls -R)\n\
         - Edit files  → use Edit  (not sed / awk)"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds (0 disables; default 30)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        let command = match call.parameters.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return json!({ "error": "missing required parameter 'command'" }),
        };
        let timeout_secs = call
            .parameters
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.ctx.bash_timeout_secs);

        if self.ctx.interrupted() {
            return json!({ "error": "cancelled" });
        }

        debug!(cmd = %command, timeout_secs, "Bash tool");
        run_command(&command, timeout_secs, &self.ctx).await
    }
}

async fn run_command(command: &str, timeout_secs: u64, ctx: &ToolContext) -> Value {
    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(command)
        .current_dir(&ctx.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // If this future is dropped before the child exits, tokio sends
        // SIGKILL so no orphan keeps writing to the terminal.
        .kill_on_drop(true);

    // setsid() detaches the child into its own session and process group.
    // That makes the group kill below reach every descendant, and a
    // subprocess cannot reacquire the controlling terminal via /dev/tty.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return json!({ "error": format!("failed to spawn shell: {e}") }),
    };
    let pid = child.id();

    // Both pipes drain into one buffer in arrival order, which is the
    // closest pipe-based equivalent of 2>&1.
    let output = Arc::new(Mutex::new(String::new()));
    let out_task = child.stdout.take().map(|s| tokio::spawn(drain(s, Arc::clone(&output))));
    let err_task = child.stderr.take().map(|s| tokio::spawn(drain(s, Arc::clone(&output))));

    let deadline = (timeout_secs > 0).then(|| Instant::now() + Duration::from_secs(timeout_secs));

    let exit = loop {
        tokio::select! {
            status = child.wait() => break status,
            _ = tokio::time::sleep(Duration::from_millis(POLL_MS)) => {
                if ctx.interrupted() {
                    kill_group(pid).await;
                    let _ = child.wait().await;
                    join_drains(out_task, err_task).await;
                    let partial = output.lock().expect("output poisoned").clone();
                    return json!({ "error": "cancelled", "output": partial });
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    kill_group(pid).await;
                    let _ = child.wait().await;
                    join_drains(out_task, err_task).await;
                    let partial = output.lock().expect("output poisoned").clone();
                    return json!({
                        "exit_code": TIMEOUT_EXIT_CODE,
                        "output": partial,
                        "timeout_error": true,
                        "error": format!("command timed out after {timeout_secs}s"),
                    });
                }
            }
        }
    };

    join_drains(out_task, err_task).await;
    let combined = output.lock().expect("output poisoned").clone();
    let exit_code = exit.ok().and_then(|s| s.code()).unwrap_or(-1) as i64;
    json!({ "exit_code": exit_code, "output": combined })
}

async fn drain(mut stream: impl AsyncReadExt + Unpin, sink: Arc<Mutex<String>>) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                sink.lock().expect("output poisoned").push_str(&chunk);
            }
        }
    }
}

async fn join_drains(
    out: Option<tokio::task::JoinHandle<()>>,
    err: Option<tokio::task::JoinHandle<()>>,
) {
    if let Some(h) = out {
        let _ = h.await;
    }
    if let Some(h) = err {
        let _ = h.await;
    }
}

/// SIGTERM the child's process group, give stragglers a short grace period,
/// then SIGKILL whatever is left.
async fn kill_group(pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        unsafe {
            libc::killpg(pid as i32, libc::SIGTERM);
        }
        tokio::time::sleep(Duration::from_millis(KILL_GRACE_MS)).await;
        unsafe {
            libc::killpg(pid as i32, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn test_ctx(timeout_secs: u64) -> (Arc<ToolContext>, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let ctx = Arc::new(ToolContext::new(
            tmp.path().to_path_buf(),
            vec![],
            Arc::new(AtomicBool::new(false)),
            tx,
            timeout_secs,
            100,
        ));
        (ctx, tmp)
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "b1".into(), name: "Bash".into(), parameters: args }
    }

    #[tokio::test]
    async fn captures_stdout() {
        let (ctx, _tmp) = test_ctx(30);
        let out = BashTool::new(ctx).execute(&call(json!({"command": "echo hello"}))).await;
        assert_eq!(out["exit_code"], 0);
        assert!(out["output"].as_str().unwrap().contains("hello"));
    }

    #[tokio::test]
    async fn stderr_is_merged_into_output() {
        let (ctx, _tmp) = test_ctx(30);
        let out = BashTool::new(ctx)
            .execute(&call(json!({"command": "echo out && echo err >&2"})))
            .await;
        let text = out["output"].as_str().unwrap();
        assert!(text.contains("out"));
        assert!(text.contains("err"));
    }

    #[tokio::test]
    async fn nonzero_exit_code_reported() {
        let (ctx, _tmp) = test_ctx(30);
        let out = BashTool::new(ctx).execute(&call(json!({"command": "exit 3"}))).await;
        assert_eq!(out["exit_code"], 3);
        assert!(out.get("error").is_none(), "exit code alone is not a tool error");
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let (ctx, tmp) = test_ctx(30);
        let out = BashTool::new(ctx).execute(&call(json!({"command": "pwd"}))).await;
        let printed = out["output"].as_str().unwrap().trim();
        let canonical = tmp.path().canonicalize().unwrap();
        assert_eq!(printed, canonical.to_string_lossy());
    }

    #[tokio::test]
    async fn missing_command_is_error() {
        let (ctx, _tmp) = test_ctx(30);
        let out = BashTool::new(ctx).execute(&call(json!({}))).await;
        assert!(out["error"].as_str().unwrap().contains("command"));
    }

    #[tokio::test]
    async fn timeout_kills_and_reports_minus_two() {
        let (ctx, _tmp) = test_ctx(30);
        let started = Instant::now();
        let out = BashTool::new(ctx)
            .execute(&call(json!({"command": "echo early && sleep 30", "timeout": 1})))
            .await;
        assert!(started.elapsed() < Duration::from_secs(10), "timeout did not fire");
        assert_eq!(out["exit_code"], TIMEOUT_EXIT_CODE);
        assert_eq!(out["timeout_error"], true);
        // Output produced before the kill is preserved.
        assert!(out["output"].as_str().unwrap().contains("early"));
    }

    #[tokio::test]
    async fn zero_timeout_disables_the_deadline() {
        let (ctx, _tmp) = test_ctx(0);
        let out = BashTool::new(ctx)
            .execute(&call(json!({"command": "sleep 0.2 && echo done"})))
            .await;
        assert_eq!(out["exit_code"], 0);
        assert!(out["output"].as_str().unwrap().contains("done"));
    }

    #[tokio::test]
    async fn pre_set_interrupt_refuses_to_start() {
        let (ctx, _tmp) = test_ctx(30);
        ctx.interrupt.store(true, Ordering::SeqCst);
        let out = BashTool::new(ctx).execute(&call(json!({"command": "echo nope"}))).await;
        assert_eq!(out["error"], "cancelled");
    }

    #[tokio::test]
    async fn interrupt_mid_run_cancels_command() {
        let (ctx, _tmp) = test_ctx(30);
        let flag = Arc::clone(&ctx.interrupt);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            flag.store(true, Ordering::SeqCst);
        });
        let started = Instant::now();
        let out = BashTool::new(ctx)
            .execute(&call(json!({"command": "sleep 30"})))
            .await;
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(out["error"], "cancelled");
    }
}
