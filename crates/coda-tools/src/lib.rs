// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Tool registry, implementations, and the parallel tool executor.
//!
//! Every tool takes a JSON parameter object and returns a JSON object; an
//! `"error"` key in the returned object marks the result as an error, its
//! absence means success.  Tools never panic on bad input and never return a
//! transport-level `Err` — all failures are JSON error objects the model can
//! read and react to.

pub mod builtin;
mod context;
pub mod events;
mod executor;
pub mod patch;
mod registry;
pub mod resolve;
mod tool;

pub use context::ToolContext;
pub use executor::{execute_batch, ProgressCallback, ProgressUpdate, ToolExecutionTracker};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::{Tool, ToolCall, ToolOutput};
