//! Catalog statistics resource.

use crate::assembler::on_catalog;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ResourceContent};
use crate::mcp::registry::{McpRegistry, RegisteredResource, ResourceResult};

pub const TRACK_STATS_URI: &str = "stats://tracks";

pub fn register_resources(registry: &mut McpRegistry) {
    registry.register_resource(RegisteredResource::json(
        TRACK_STATS_URI,
        "Track Statistics",
        "Track counts per intensity and type, with BPM and duration aggregates",
        track_stats_handler,
    ));
}

async fn track_stats_handler(ctx: ToolContext) -> ResourceResult {
    let stats = on_catalog(&ctx.catalog, |catalog| catalog.get_track_stats())
        .await
        .map_err(|e| McpError::InternalError(format!("{:#}", e)))?;
    let text =
        serde_json::to_string_pretty(&stats).map_err(|e| McpError::InternalError(e.to_string()))?;

    Ok(vec![ResourceContent {
        uri: TRACK_STATS_URI.to_string(),
        mime_type: "application/json",
        text,
    }])
}
