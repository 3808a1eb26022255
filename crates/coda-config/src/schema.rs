// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default chat completions endpoint used when `OPENAI_API_BASE` is unset.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default model identifier when neither `OPENAI_MODEL` nor
/// `ANTHROPIC_MODEL` is set.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default Bash tool timeout in seconds.  A value of 0 disables the timeout.
pub const DEFAULT_BASH_TIMEOUT_SECS: u64 = 30;

/// Default cap on Grep matches before truncation.
pub const DEFAULT_GREP_MAX_RESULTS: usize = 100;

/// Default total wall-clock retry budget in milliseconds.
pub const DEFAULT_MAX_RETRY_DURATION_MS: u64 = 120_000;

/// Upper bound accepted for the retry budget.  Values above this are clamped
/// so a stray environment value cannot stall an instruction for hours.
pub const MAX_RETRY_DURATION_CEILING_MS: u64 = 600_000;

/// Which backend the provider layer talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions endpoint (the default).
    OpenAi,
    /// AWS Bedrock, authenticated through the cloud signer.
    Bedrock,
}

/// Resolved runtime configuration.
///
/// Every field maps to a recognized environment variable; see [`crate::load`]
/// for the variable names.  The struct itself is environment-agnostic so
/// tests can construct arbitrary configurations without touching the process
/// environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderKind,
    /// API credential.  Required for the OpenAI provider; the Bedrock
    /// provider reads cloud credentials from its profile instead.
    pub api_key: Option<String>,
    /// Chat completions base URL (without the `/chat/completions` suffix).
    pub api_base: String,
    /// Model identifier forwarded to the provider.
    pub model: String,
    /// AWS region for the Bedrock provider.
    pub aws_region: Option<String>,
    /// When true, no cache-control hints are attached to requests.
    pub disable_prompt_caching: bool,
    /// Total wall-clock budget for retries of a single API call.
    pub max_retry_duration_ms: u64,
    /// Default Bash tool timeout in seconds (0 disables).
    pub bash_timeout_secs: u64,
    /// Grep match cap before truncation.
    pub grep_max_results: usize,
    /// TUI colorscheme name.
    pub theme: Option<String>,
    /// Explicit log file path.  Takes precedence over `log_dir`.
    pub log_path: Option<PathBuf>,
    /// Directory for timestamped log files when `log_path` is unset.
    pub log_dir: Option<PathBuf>,
    /// Path of the append-only API audit log.
    pub db_path: Option<PathBuf>,
    /// Whether MCP plugin tools are exposed to the model.
    pub mcp_enabled: bool,
    /// Path of the MCP plugin configuration file, forwarded opaquely to the
    /// plugin handler.
    pub mcp_config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            aws_region: None,
            disable_prompt_caching: false,
            max_retry_duration_ms: DEFAULT_MAX_RETRY_DURATION_MS,
            bash_timeout_secs: DEFAULT_BASH_TIMEOUT_SECS,
            grep_max_results: DEFAULT_GREP_MAX_RESULTS,
            theme: None,
            log_path: None,
            log_dir: None,
            db_path: None,
            mcp_enabled: false,
            mcp_config: None,
        }
    }
}

impl Config {
    /// The effective audit-log path: `db_path` when set, otherwise
    /// `<data dir>/coda/api_log.jsonl`.
    pub fn audit_log_path(&self) -> PathBuf {
        if let Some(p) = &self.db_path {
            return p.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coda")
            .join("api_log.jsonl")
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_provider_is_openai() {
        let cfg = Config::default();
        assert_eq!(cfg.provider, ProviderKind::OpenAi);
    }

    #[test]
    fn default_constants_applied() {
        let cfg = Config::default();
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.max_retry_duration_ms, 120_000);
        assert_eq!(cfg.bash_timeout_secs, 30);
        assert_eq!(cfg.grep_max_results, 100);
        assert!(!cfg.disable_prompt_caching);
        assert!(!cfg.mcp_enabled);
    }

    #[test]
    fn audit_log_path_prefers_db_path() {
        let cfg = Config {
            db_path: Some(PathBuf::from("/tmp/audit.jsonl")),
            ..Config::default()
        };
        assert_eq!(cfg.audit_log_path(), PathBuf::from("/tmp/audit.jsonl"));
    }

    #[test]
    fn audit_log_path_falls_back_to_data_dir() {
        let cfg = Config::default();
        let p = cfg.audit_log_path();
        assert!(p.ends_with("coda/api_log.jsonl"), "unexpected: {}", p.display());
    }
}
