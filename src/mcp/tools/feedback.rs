//! Feedback and routine history tools.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{json_result, parse_args, MAX_TOOL_LIMIT};
use crate::catalog_store::{NewFeedback, Rating, StoredRoutine, TopRatedQuery, TopRatedTrack};
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::request::Difficulty;

pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(rate_track_tool());
    registry.register_tool(get_top_rated_tracks_tool());
    registry.register_tool(get_feedback_summary_tool());
    registry.register_tool(list_routines_tool());
}

fn default_limit() -> usize {
    10
}

// ============================================================================
// rate_track
// ============================================================================

#[derive(Debug, Deserialize)]
struct RateTrackParams {
    title: String,
    rating: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    audience: Option<String>,
}

fn rate_track_tool() -> RegisteredTool {
    ToolBuilder::new("rate_track")
        .description("Record a thumbs up or down for a catalog track")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Track title or part of it"
                },
                "rating": { "type": "string", "enum": ["up", "down"] },
                "context": {
                    "type": "string",
                    "description": "Where the track was used, e.g. 'climb' or 'warmup'"
                },
                "audience": { "type": "string" }
            },
            "required": ["title", "rating"]
        }))
        .build(rate_track_handler)
}

async fn rate_track_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: RateTrackParams = parse_args(params)?;
    let rating = match params.rating.trim().to_ascii_lowercase().as_str() {
        "up" => Rating::Up,
        "down" => Rating::Down,
        other => {
            return Err(McpError::InvalidParams(format!(
                "rating must be 'up' or 'down', got '{}'",
                other
            )))
        }
    };
    let title = params.title.trim().to_string();
    if title.is_empty() {
        return Err(McpError::InvalidParams("title must not be empty".to_string()));
    }

    let feedback = NewFeedback {
        title_fragment: title.clone(),
        rating,
        context: params.context,
        audience: params.audience,
    };
    let recorded = ctx
        .query(move |catalog| catalog.record_feedback(&feedback))
        .await?;
    match recorded {
        Some(recorded) => json_result(&recorded),
        None => Ok(ToolsCallResult::error(format!(
            "Track '{}' not found in database",
            title
        ))),
    }
}

// ============================================================================
// get_top_rated_tracks
// ============================================================================

#[derive(Debug, Deserialize)]
struct TopRatedParams {
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
struct TopRatedResult {
    count: usize,
    tracks: Vec<TopRatedTrack>,
}

fn get_top_rated_tracks_tool() -> RegisteredTool {
    ToolBuilder::new("get_top_rated_tracks")
        .description(
            "Tracks with the most feedback of a rating, optionally for one context or audience",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "rating": {
                    "type": "string",
                    "description": "'up' (default), 'down' or a star rating 1-5"
                },
                "context": {
                    "type": "string",
                    "description": "Context label, e.g. 'climb' or 'warmup'"
                },
                "audience": { "type": "string" },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50
                }
            }
        }))
        .build(get_top_rated_tracks_handler)
}

async fn get_top_rated_tracks_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: TopRatedParams = parse_args(params)?;
    let rating = match params.rating.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(label) => Some(
            Rating::from_db_str(label)
                .ok_or_else(|| McpError::InvalidParams(format!("unknown rating '{}'", label)))?
                .to_db_string(),
        ),
    };

    let query = TopRatedQuery {
        rating,
        context: params.context,
        audience: params.audience,
        limit: params.limit.clamp(1, MAX_TOOL_LIMIT),
    };
    let tracks = ctx
        .query(move |catalog| catalog.get_top_rated_tracks(&query))
        .await?;

    json_result(&TopRatedResult {
        count: tracks.len(),
        tracks,
    })
}

// ============================================================================
// get_feedback_summary
// ============================================================================

fn get_feedback_summary_tool() -> RegisteredTool {
    ToolBuilder::new("get_feedback_summary")
        .description("Feedback totals overall and per context")
        .build(get_feedback_summary_handler)
}

async fn get_feedback_summary_handler(ctx: ToolContext, _params: Value) -> ToolResult {
    let summary = ctx.query(|catalog| catalog.get_feedback_summary()).await?;
    json_result(&summary)
}

// ============================================================================
// list_routines
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListRoutinesParams {
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
struct ListRoutinesResult {
    count: usize,
    routines: Vec<StoredRoutine>,
}

fn list_routines_tool() -> RegisteredTool {
    ToolBuilder::new("list_routines")
        .description("Stored routines with their track links")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "difficulty": {
                    "type": "string",
                    "enum": ["beginner", "intermediate", "advanced", "expert"]
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50
                }
            }
        }))
        .build(list_routines_handler)
}

async fn list_routines_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: ListRoutinesParams = parse_args(params)?;
    let difficulty = match params.difficulty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(label) => Some(
            Difficulty::parse(label)
                .ok_or_else(|| McpError::InvalidParams(format!("unknown difficulty '{}'", label)))?
                .to_string(),
        ),
    };

    let limit = params.limit.clamp(1, MAX_TOOL_LIMIT);
    let routines = ctx
        .query(move |catalog| catalog.list_routines(difficulty, limit))
        .await?;

    json_result(&ListRoutinesResult {
        count: routines.len(),
        routines,
    })
}
