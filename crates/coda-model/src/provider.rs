// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{ApiCallResult, ChatRequest};

/// One LLM vendor's HTTP API behind a uniform interface.
///
/// `call_api` performs exactly one attempt; retries live in
/// [`crate::retry`].  Implementations MUST sanitize their responses so that
/// every [`crate::ToolCallRequest`] they return carries a non-empty id and
/// name — the tool executor depends on it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider id for status display and logs.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Perform a single completion attempt.
    ///
    /// Never returns `Err`: transport failures are encoded in the
    /// [`ApiCallResult`] so the retry controller can classify them.
    async fn call_api(&self, req: &ChatRequest) -> ApiCallResult;

    /// Release provider resources.  Called once at shutdown.
    fn cleanup(&self) {}
}
