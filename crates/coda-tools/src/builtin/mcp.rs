// Copyright (c) 2024-2026 the coda authors
//
// SPDX-License-Identifier: Apache-2.0
//! Plugin-backed tools.
//!
//! Discovery, transport, and server lifecycle all live behind the opaque
//! [`McpHandler`] boundary; this module only adapts that boundary to the
//! [`Tool`] contract (JSON in, JSON out, `"error"` key on failure).  Three
//! fixed tools are always registered when a handler is present, plus one
//! proxy per dynamically discovered plugin tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::registry::{ToolRegistry, ToolSchema};
use crate::tool::{Tool, ToolCall};

/// The external plugin boundary.  Same contract as built-in tools: a JSON
/// parameter object in, a JSON object out, `"error"` marking failure.
#[async_trait]
pub trait McpHandler: Send + Sync {
    async fn handle(&self, tool_name: &str, parameters: &Value) -> Value;

    /// Additional tools discovered from plugin servers, registered verbatim.
    fn dynamic_tools(&self) -> Vec<ToolSchema> {
        Vec::new()
    }
}

/// Stand-in handler used when MCP is enabled but no plugin host is wired
/// in.  Every call reports the missing host instead of failing silently.
pub struct DisconnectedMcpHandler;

#[async_trait]
impl McpHandler for DisconnectedMcpHandler {
    async fn handle(&self, tool_name: &str, _parameters: &Value) -> Value {
        json!({ "error": format!("{tool_name}: no MCP plugin host is connected") })
    }
}

/// A registry entry that forwards to the plugin handler.
pub struct McpProxyTool {
    name: String,
    description: String,
    parameters: Value,
    handler: Arc<dyn McpHandler>,
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters.clone()
    }

    async fn execute(&self, call: &ToolCall) -> Value {
        self.handler.handle(&self.name, &call.parameters).await
    }
}

/// Register the fixed MCP tools and every dynamically discovered one.
pub fn register_mcp_tools(registry: &mut ToolRegistry, handler: Arc<dyn McpHandler>) {
    let fixed: [(&str, &str, Value); 3] = [
        (
            "ListMcpResources",
            "List resources available from connected MCP servers.",
            json!({
                "type": "object",
                "properties": {
                    "server": { "type": "string", "description": "Restrict to one server" }
                },
                "additionalProperties": false
            }),
        ),
        (
            "ReadMcpResource",
            "Read one resource from a connected MCP server.",
            json!({
                "type": "object",
                "properties": {
                    "server": { "type": "string", "description": "Server name" },
                    "uri": { "type": "string", "description": "Resource URI" }
                },
                "required": ["server", "uri"],
                "additionalProperties": false
            }),
        ),
        (
            "CallMcpTool",
            "Invoke a tool exposed by a connected MCP server.",
            json!({
                "type": "object",
                "properties": {
                    "server": { "type": "string", "description": "Server name" },
                    "tool": { "type": "string", "description": "Tool name on that server" },
                    "arguments": { "type": "object", "description": "Tool arguments" }
                },
                "required": ["server", "tool"],
                "additionalProperties": false
            }),
        ),
    ];

    for (name, description, parameters) in fixed {
        registry.register(McpProxyTool {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            handler: Arc::clone(&handler),
        });
    }
    for schema in handler.dynamic_tools() {
        registry.register(McpProxyTool {
            name: schema.name,
            description: schema.description,
            parameters: schema.parameters,
            handler: Arc::clone(&handler),
        });
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
