// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use coda_config::{Config, ProviderKind};
use coda_core::{prompts, Agent, AgentSettings, ConversationStore, JsonlAuditSink};
use coda_model::{
    AuditSink, BearerTokenSigner, BedrockProvider, NullSink, OpenAiProvider, Provider,
};
use coda_tools::builtin::{register_builtin, register_mcp_tools, DisconnectedMcpHandler};
use coda_tools::{ToolContext, ToolRegistry};
use coda_tui::{pipeline, App};

/// Output token ceiling sent with every completion request.
const MAX_COMPLETION_TOKENS: u32 = 4096;

/// Capacity of the out-of-band tool event channel (diffs, todo updates).
const TOOL_EVENT_QUEUE: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::parse_or_exit();

    // Missing credentials are the one fatal startup error.
    let config = coda_config::load()?;
    init_logging(&config);

    run_interactive(config).await
}

/// Logging goes to a file or nowhere: writing to stderr would corrupt the
/// terminal UI.  The level comes from `CLAUDE_LOG_LEVEL` (default `info`).
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("CLAUDE_LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let path = config.log_path.clone().or_else(|| {
        config.log_dir.as_ref().map(|dir| {
            dir.join(format!("coda-{}.log", chrono::Local::now().format("%Y%m%dT%H%M%S")))
        })
    });
    let Some(path) = path else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
    }
}

async fn run_interactive(config: Config) -> anyhow::Result<()> {
    let working_dir = std::env::current_dir().context("reading current directory")?;

    // Shared tool state: working dirs, interrupt flag, todo list, tunables.
    let (tool_event_tx, tool_event_rx) = mpsc::channel(TOOL_EVENT_QUEUE);
    let tool_ctx = Arc::new(ToolContext::new(
        working_dir.clone(),
        Vec::new(),
        Arc::new(std::sync::atomic::AtomicBool::new(false)),
        tool_event_tx,
        config.bash_timeout_secs,
        config.grep_max_results,
    ));

    let mut registry = ToolRegistry::new();
    register_builtin(&mut registry, &tool_ctx);
    if config.mcp_enabled {
        // Plugin discovery lives outside this binary; until a host is wired
        // in, the MCP tools exist but report the missing connection.
        if let Some(path) = &config.mcp_config {
            warn!(config = %path.display(), "MCP enabled; plugin host not linked into this build");
        }
        register_mcp_tools(&mut registry, Arc::new(DisconnectedMcpHandler));
    }
    let registry = Arc::new(registry);

    let system_prompt = prompts::assemble(&prompts::gather(&working_dir, &tool_ctx.additional_dirs));
    let store = Arc::new(ConversationStore::new(system_prompt, Arc::clone(&tool_ctx.todos)));

    let (provider, endpoint_url): (Arc<dyn Provider>, String) = match config.provider {
        ProviderKind::OpenAi => {
            let key = config.api_key.clone().context("OPENAI_API_KEY is not set")?;
            let p = OpenAiProvider::new(config.model.clone(), key, &config.api_base);
            let endpoint = p.endpoint_url().to_string();
            (Arc::new(p), endpoint)
        }
        ProviderKind::Bedrock => {
            let region = config.aws_region.clone().context("AWS region is not configured")?;
            let signer = Arc::new(BearerTokenSigner::from_env()?);
            let p = BedrockProvider::new(config.model.clone(), &region, signer);
            let endpoint = p.endpoint_url().to_string();
            (Arc::new(p), endpoint)
        }
    };

    let sink: Arc<dyn AuditSink> = match JsonlAuditSink::open(&config.audit_log_path()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            warn!(error = %e, "audit log unavailable; API calls will not be recorded");
            Arc::new(NullSink)
        }
    };

    let settings = AgentSettings {
        model: config.model.clone(),
        endpoint_url,
        max_retry_duration_ms: config.max_retry_duration_ms,
        max_completion_tokens: MAX_COMPLETION_TOKENS,
        cache_hints: !config.disable_prompt_caching,
    };

    let (ui_tx, ui_rx) = pipeline::ui_channel();
    let (instruction_tx, instruction_rx) = pipeline::instruction_channel();

    let agent = Agent::new(
        Arc::clone(&store),
        registry,
        Arc::clone(&tool_ctx),
        provider,
        sink,
        settings,
        ui_tx,
        tool_event_rx,
    );
    let worker = tokio::spawn(agent.run(instruction_rx));

    let app = App::new(
        store,
        Arc::clone(&tool_ctx.interrupt),
        instruction_tx,
        ui_rx,
        config.model.clone(),
    );
    let result = app.run().await;

    // The app dropped its sender on exit; the worker drains the closed
    // queue and terminates.
    worker.await.context("joining AI worker")?;
    result
}
