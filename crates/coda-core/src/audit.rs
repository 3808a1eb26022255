// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: MIT
//! Append-only JSONL audit log.
//!
//! One line per API attempt, in the [`coda_model::AuditRecord`] schema.  A
//! sink that cannot write logs the failure and drops the record; audit
//! trouble never takes the session down.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use coda_model::{AuditRecord, AuditSink};
use tracing::error;

pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open (creating parents as needed) the audit log for appending.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening audit log {}", path.display()))?;
        Ok(Self { path: path.to_path_buf(), file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: AuditRecord) {
        let line = match serde_json::to_string(&record) {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "cannot serialize audit record");
                return;
            }
        };
        let mut file = self.file.lock().expect("audit sink poisoned");
        if let Err(e) = writeln!(file, "{line}") {
            error!(path = %self.path.display(), error = %e, "cannot append audit record");
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use coda_model::AuditStatus;
    use serde_json::json;

    use super::*;

    fn record(status: AuditStatus, http_status: u16) -> AuditRecord {
        AuditRecord {
            session_id: "sess".into(),
            endpoint_url: "http://localhost/v1/chat/completions".into(),
            request_body: json!({"model": "m"}),
            response_body: None,
            model: "m".into(),
            status,
            http_status,
            error_message: None,
            duration_ms: 7,
            tool_count: 0,
        }
    }

    #[test]
    fn appends_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let sink = JsonlAuditSink::open(&path).unwrap();
        sink.record(record(AuditStatus::Error, 429));
        sink.record(record(AuditStatus::Success, 200));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: AuditRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.http_status, 429);
        let second: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.status, AuditStatus::Success);
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/dir/audit.jsonl");
        let sink = JsonlAuditSink::open(&path).unwrap();
        sink.record(record(AuditStatus::Success, 200));
        assert!(path.exists());
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        {
            let sink = JsonlAuditSink::open(&path).unwrap();
            sink.record(record(AuditStatus::Success, 200));
        }
        {
            let sink = JsonlAuditSink::open(&path).unwrap();
            sink.record(record(AuditStatus::Error, 500));
        }
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
