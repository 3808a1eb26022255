// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Jittered exponential backoff around [`Provider::call_api`].
//!
//! The controller is bounded by wall-clock time, not attempt count: retries
//! stop once the total slept duration would exceed the configured budget.
//! Every attempt — including the successful one — writes a single
//! [`AuditRecord`] to the sink.
//!
//! Backoff: starts at 1 s, doubles per retry, capped at 60 s.  Each delay is
//! reduced by a random jitter of up to a quarter of the current backoff so
//! that clients which failed together do not retry together.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::audit::{AuditRecord, AuditSink, AuditStatus};
use crate::{ApiCallResult, ApiResponse, ChatRequest, Provider};

pub const INITIAL_BACKOFF_MS: u64 = 1_000;
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Granularity of interrupt polling during a backoff sleep.
const INTERRUPT_POLL_MS: u64 = 100;

/// Why a call could not produce a response.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The interrupt flag was raised while waiting.
    #[error("cancelled")]
    Cancelled,
    /// A non-retryable failure (4xx other than 408/429, protocol violation).
    #[error("API error (HTTP {status}): {message}")]
    Fatal { status: u16, message: String },
    /// Retryable failures persisted past the wall-clock budget.
    #[error("retry budget exhausted: {message}")]
    BudgetExhausted { message: String },
}

/// Exponential backoff state for one logical API call.
#[derive(Debug)]
pub struct BackoffSchedule {
    backoff_ms: u64,
    budget_ms: u64,
    slept_ms: u64,
}

impl BackoffSchedule {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            backoff_ms: INITIAL_BACKOFF_MS,
            budget_ms,
            slept_ms: 0,
        }
    }

    /// Total milliseconds handed out so far.
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    /// The next delay to sleep, or `None` when the budget is exhausted.
    ///
    /// `delay = backoff − rand(0..backoff/4)`, clamped to the remaining
    /// budget.  Doubles the backoff (up to [`MAX_BACKOFF_MS`]) on each call.
    pub fn next_delay(&mut self) -> Option<u64> {
        let remaining = self.budget_ms.saturating_sub(self.slept_ms);
        if remaining == 0 {
            return None;
        }
        let quarter = self.backoff_ms / 4;
        let jitter = if quarter > 0 {
            rand::thread_rng().gen_range(0..quarter)
        } else {
            0
        };
        let delay = (self.backoff_ms - jitter).min(remaining);
        self.slept_ms += delay;
        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
        Some(delay)
    }
}

/// Drive `provider.call_api` until it succeeds, fails permanently, exhausts
/// the budget, or is interrupted.
///
/// `session_id` and `endpoint_url` are stamped into each audit record.
pub async fn call_with_retry(
    provider: &dyn Provider,
    req: &ChatRequest,
    budget_ms: u64,
    sink: &dyn AuditSink,
    session_id: &str,
    endpoint_url: &str,
    interrupt: &AtomicBool,
) -> Result<ApiResponse, CallError> {
    let mut schedule = BackoffSchedule::new(budget_ms);
    let mut attempt_num: u32 = 0;

    loop {
        if interrupt.load(Ordering::SeqCst) {
            return Err(CallError::Cancelled);
        }

        attempt_num += 1;
        let result = provider.call_api(req).await;
        sink.record(to_audit_record(&result, req, session_id, endpoint_url));

        if let Some(response) = result.response {
            if attempt_num > 1 {
                debug!(attempt_num, "API call succeeded after retries");
            }
            return Ok(response);
        }

        let message = result
            .error_message
            .unwrap_or_else(|| "unknown provider error".to_string());

        if !result.is_retryable {
            return Err(CallError::Fatal {
                status: result.http_status,
                message,
            });
        }

        let delay_ms = match schedule.next_delay() {
            Some(d) => d,
            None => return Err(CallError::BudgetExhausted { message }),
        };
        warn!(
            attempt_num,
            http_status = result.http_status,
            delay_ms,
            slept_ms = schedule.slept_ms(),
            "transient API failure; backing off"
        );
        if sleep_interruptible(delay_ms, interrupt).await {
            return Err(CallError::Cancelled);
        }
    }
}

/// Sleep `delay_ms`, polling the interrupt flag every 100 ms.  Returns true
/// when the sleep was cut short by an interrupt.
async fn sleep_interruptible(delay_ms: u64, interrupt: &AtomicBool) -> bool {
    let mut remaining = delay_ms;
    while remaining > 0 {
        if interrupt.load(Ordering::SeqCst) {
            return true;
        }
        let chunk = remaining.min(INTERRUPT_POLL_MS);
        tokio::time::sleep(Duration::from_millis(chunk)).await;
        remaining -= chunk;
    }
    interrupt.load(Ordering::SeqCst)
}

fn to_audit_record(
    result: &ApiCallResult,
    req: &ChatRequest,
    session_id: &str,
    endpoint_url: &str,
) -> AuditRecord {
    let (status, response_body, tool_count) = match &result.response {
        Some(r) => (AuditStatus::Success, Some(r.raw.clone()), r.tool_calls.len()),
        None => (AuditStatus::Error, None, 0),
    };
    AuditRecord {
        session_id: session_id.to_string(),
        endpoint_url: endpoint_url.to_string(),
        request_body: result.request_json.clone(),
        response_body,
        model: req.model.clone(),
        status,
        http_status: result.http_status,
        error_message: result.error_message.clone(),
        duration_ms: result.duration_ms,
        tool_count,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
