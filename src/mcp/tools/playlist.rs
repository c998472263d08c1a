//! Playlist Tools
//!
//! Routine building and whole-class recommendations through the assembler.

use serde_json::Value;
use tracing::info;

use super::{json_result, parse_args};
use crate::assembler::BuildError;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::request::PlaylistRequest;

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(build_class_playlist_tool());
    registry.register_tool(build_hybrid_playlist_tool());
    registry.register_tool(recommend_class_tracks_tool());
}

/// Class length for `recommend_class_tracks` when none is given.
const DEFAULT_RECOMMEND_MINUTES: f64 = 55.0;

fn build_error(e: BuildError) -> McpError {
    match e {
        BuildError::InvalidRequest(msg) => McpError::InvalidParams(msg),
        BuildError::CatalogUnavailable(msg) => McpError::ToolExecutionFailed(msg),
        BuildError::NoSuggestionService => McpError::ToolExecutionFailed(e.to_string()),
    }
}

fn request_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "duration_minutes": {
                "type": "number",
                "description": "Class length in minutes"
            },
            "difficulty": {
                "type": "string",
                "enum": ["beginner", "intermediate", "advanced", "expert"]
            },
            "audience": {
                "type": "string",
                "description": "Audience label, e.g. 'spin-mixed' or '50+'"
            },
            "theme": { "type": "string" },
            "vibe": { "type": "string" },
            "intensity_arc": {
                "description": "Arc text such as 'Warmup -> Climb:10 -> Sprint -> Cooldown', \
                                or a list of {phase, minutes?, share?}",
                "oneOf": [
                    { "type": "string" },
                    {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "phase": { "type": "string" },
                                "minutes": { "type": "number" },
                                "share": { "type": "number" }
                            },
                            "required": ["phase"]
                        }
                    }
                ]
            },
            "preferred_genres": { "type": "array", "items": { "type": "string" } },
            "excluded_genres": { "type": "array", "items": { "type": "string" } },
            "preferred_artists": { "type": "array", "items": { "type": "string" } },
            "excluded_artists": { "type": "array", "items": { "type": "string" } },
            "user_goal": { "type": "string" },
            "debug": {
                "type": "boolean",
                "description": "Include per-slot diagnostics"
            }
        },
        "required": ["duration_minutes"]
    })
}

fn build_class_playlist_tool() -> RegisteredTool {
    ToolBuilder::new("build_class_playlist")
        .description("Build a cycling class routine from the catalog only")
        .input_schema(request_schema())
        .build(|ctx, params| build_handler(ctx, params, false))
}

fn build_hybrid_playlist_tool() -> RegisteredTool {
    ToolBuilder::new("build_hybrid_playlist")
        .description(
            "Build a cycling class routine from the catalog, asking the suggestion service \
             to fill slots the catalog cannot",
        )
        .input_schema(request_schema())
        .build(|ctx, params| build_handler(ctx, params, true))
}

async fn build_handler(ctx: ToolContext, params: Value, hybrid: bool) -> ToolResult {
    let mut request: PlaylistRequest = parse_args(params)?;
    request.hybrid = Some(hybrid);

    let routine = ctx.assembler.build(&request).await.map_err(build_error)?;

    info!(
        routine = %routine.id,
        tracks = routine.entries.len(),
        unfilled = routine.unfilled_slots.len(),
        hybrid = routine.hybrid,
        "Routine built over MCP"
    );
    json_result(&routine)
}

fn recommend_class_tracks_tool() -> RegisteredTool {
    let mut schema = request_schema();
    schema["properties"]["duration_minutes"]["description"] =
        serde_json::json!("Class length in minutes (default 55)");
    schema["required"] = serde_json::json!([]);
    ToolBuilder::new("recommend_class_tracks")
        .description(
            "Ask the suggestion service for a whole class of tracks, \
             matched against the catalog where possible",
        )
        .input_schema(schema)
        .build(recommend_class_tracks_handler)
}

async fn recommend_class_tracks_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let duration_given = params.get("duration_minutes").is_some_and(|v| !v.is_null());
    let mut request: PlaylistRequest = parse_args(params)?;
    if !duration_given {
        request.duration_minutes = DEFAULT_RECOMMEND_MINUTES;
    }

    match ctx.assembler.recommend(&request).await {
        Ok(recommendations) => json_result(&recommendations),
        Err(BuildError::NoSuggestionService) => Ok(ToolsCallResult::error(
            "No suggestion service is configured; \
             set up gap_fill and its API key to use this tool",
        )),
        Err(e) => Err(build_error(e)),
    }
}
