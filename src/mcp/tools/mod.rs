//! MCP Tools
//!
//! Routine building, catalog lookups and feedback reporting.

pub mod catalog;
pub mod feedback;
pub mod playlist;

use super::protocol::{McpError, ToolsCallResult};
use super::registry::{McpRegistry, ToolResult};
use serde::Serialize;

/// Register all tools with the registry
pub fn register_all_tools(registry: &mut McpRegistry) {
    playlist::register_tools(registry);
    catalog::register_tools(registry);
    feedback::register_tools(registry);
}

/// Largest page any listing tool returns.
pub(crate) const MAX_TOOL_LIMIT: usize = 50;

pub(crate) fn parse_args<T>(params: serde_json::Value) -> Result<T, McpError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

pub(crate) fn json_result<T: Serialize>(value: &T) -> ToolResult {
    ToolsCallResult::json(value).map_err(|e| McpError::InternalError(e.to_string()))
}
