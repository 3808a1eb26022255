// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use anyhow::bail;
use tracing::{debug, warn};

use crate::{
    Config, ProviderKind, DEFAULT_API_BASE, DEFAULT_BASH_TIMEOUT_SECS, DEFAULT_GREP_MAX_RESULTS,
    DEFAULT_MAX_RETRY_DURATION_MS, DEFAULT_MODEL, MAX_RETRY_DURATION_CEILING_MS,
};

/// Read one variable through a caller-supplied lookup so tests can run
/// without mutating the process environment.
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Load configuration from the process environment.
///
/// Recognized variables:
/// - `OPENAI_API_KEY` — API credential (required unless Bedrock mode is on)
/// - `OPENAI_API_BASE` — base URL override
/// - `OPENAI_MODEL` / `ANTHROPIC_MODEL` — model identifier
/// - `CLAUDE_CODE_USE_BEDROCK` — select the Bedrock provider (needs
///   `ANTHROPIC_MODEL` and `AWS_REGION`)
/// - `DISABLE_PROMPT_CACHING` — suppress cache-control hints
/// - `CLAUDE_C_MAX_RETRY_DURATION_MS` — retry budget in ms (clamped to 600 000)
/// - `CLAUDE_C_BASH_TIMEOUT` — Bash default timeout in seconds
/// - `CLAUDE_C_GREP_MAX_RESULTS` — Grep truncation cap
/// - `CLAUDE_C_THEME`, `CLAUDE_C_LOG_PATH`, `CLAUDE_C_LOG_DIR`,
///   `CLAUDE_C_DB_PATH` — UI and file locations (`CLAUDE_LOG_LEVEL` is read
///   directly by the logging initializer)
/// - `CLAUDE_MCP_ENABLED`, `CLAUDE_MCP_CONFIG` — plugin configuration
pub fn load() -> anyhow::Result<Config> {
    load_from(&|name| std::env::var(name).ok())
}

/// Environment-injectable variant of [`load`] used by tests.
pub fn load_from(env: EnvLookup) -> anyhow::Result<Config> {
    let use_bedrock = flag(env("CLAUDE_CODE_USE_BEDROCK"));
    let provider = if use_bedrock {
        ProviderKind::Bedrock
    } else {
        ProviderKind::OpenAi
    };

    let api_key = env("OPENAI_API_KEY").filter(|s| !s.is_empty());
    let model = match provider {
        // Bedrock serves Anthropic models; the Anthropic name is mandatory.
        ProviderKind::Bedrock => match env("ANTHROPIC_MODEL") {
            Some(m) if !m.is_empty() => m,
            _ => bail!("CLAUDE_CODE_USE_BEDROCK is set but ANTHROPIC_MODEL is not"),
        },
        ProviderKind::OpenAi => env("OPENAI_MODEL")
            .or_else(|| env("ANTHROPIC_MODEL"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    };

    if provider == ProviderKind::OpenAi && api_key.is_none() {
        bail!("OPENAI_API_KEY is not set");
    }

    let aws_region = env("AWS_REGION").or_else(|| env("AWS_DEFAULT_REGION"));
    if provider == ProviderKind::Bedrock && aws_region.is_none() {
        bail!("CLAUDE_CODE_USE_BEDROCK is set but no AWS region is configured");
    }

    let max_retry_duration_ms = match parse_u64(env("CLAUDE_C_MAX_RETRY_DURATION_MS")) {
        Some(ms) if ms > MAX_RETRY_DURATION_CEILING_MS => {
            warn!(
                requested = ms,
                ceiling = MAX_RETRY_DURATION_CEILING_MS,
                "retry budget clamped"
            );
            MAX_RETRY_DURATION_CEILING_MS
        }
        Some(ms) => ms,
        None => DEFAULT_MAX_RETRY_DURATION_MS,
    };

    let config = Config {
        provider,
        api_key,
        api_base: env("OPENAI_API_BASE")
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        model,
        aws_region,
        disable_prompt_caching: flag(env("DISABLE_PROMPT_CACHING")),
        max_retry_duration_ms,
        bash_timeout_secs: parse_u64(env("CLAUDE_C_BASH_TIMEOUT"))
            .unwrap_or(DEFAULT_BASH_TIMEOUT_SECS),
        grep_max_results: parse_u64(env("CLAUDE_C_GREP_MAX_RESULTS"))
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_GREP_MAX_RESULTS),
        theme: env("CLAUDE_C_THEME"),
        log_path: path(env("CLAUDE_C_LOG_PATH")),
        log_dir: path(env("CLAUDE_C_LOG_DIR")),
        db_path: path(env("CLAUDE_C_DB_PATH")),
        mcp_enabled: flag(env("CLAUDE_MCP_ENABLED")),
        mcp_config: path(env("CLAUDE_MCP_CONFIG")),
    };

    debug!(
        provider = ?config.provider,
        model = %config.model,
        api_base = %config.api_base,
        "configuration loaded"
    );
    Ok(config)
}

/// "1", "true", "yes", "on" (case-insensitive) are truthy; anything else,
/// including an unset variable, is false.
fn flag(v: Option<String>) -> bool {
    matches!(
        v.as_deref().map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true") | Some("yes") | Some("on")
    )
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    let raw = v?;
    match raw.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(value = %raw, "ignoring unparseable numeric environment value");
            None
        }
    }
}

fn path(v: Option<String>) -> Option<PathBuf> {
    let raw = v?;
    if raw.is_empty() {
        return None;
    }
    Some(PathBuf::from(shellexpand::tilde(&raw).into_owned()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
