// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! API-call audit records.
//!
//! Every provider attempt — success or failure — produces exactly one
//! [`AuditRecord`].  The sink itself is an external collaborator; this module
//! defines the record schema, the sink trait, and two trivial
//! implementations (no-op, in-memory) used in tests and when no sink is
//! configured.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
}

/// One appended record per API attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub session_id: String,
    pub endpoint_url: String,
    pub request_body: Value,
    pub response_body: Option<Value>,
    pub model: String,
    pub status: AuditStatus,
    pub http_status: u16,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    /// Number of tool calls carried by the response (0 on error).
    pub tool_count: usize,
}

/// Append-only destination for audit records.
///
/// Implementations must not panic; a failing sink logs and drops the record.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord);
}

/// Discards every record.
pub struct NullSink;

impl AuditSink for NullSink {
    fn record(&self, _record: AuditRecord) {}
}

/// Collects records in memory so tests can assert on them.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink poisoned").clone()
    }
}

impl AuditSink for MemorySink {
    fn record(&self, record: AuditRecord) {
        self.records.lock().expect("audit sink poisoned").push(record);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
