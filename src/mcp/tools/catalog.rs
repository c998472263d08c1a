//! Catalog Tools
//!
//! Tools for searching and reading catalog tracks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{json_result, parse_args, MAX_TOOL_LIMIT};
use crate::catalog_store::{Intensity, Track, TrackFilters};
use crate::feedback::FeedbackRanker;
use crate::identity::ExclusionSet;
use crate::mcp::context::ToolContext;
use crate::mcp::protocol::{McpError, ToolsCallResult};
use crate::mcp::registry::{McpRegistry, RegisteredTool, ToolBuilder, ToolResult};
use crate::planner::{Slot, SlotRole};
use crate::request::PlaylistRequest;
use crate::selector::{CandidateSummary, FilterTier, TrackSelector};

/// Register catalog tools with the registry
pub fn register_tools(registry: &mut McpRegistry) {
    registry.register_tool(search_tracks_tool());
    registry.register_tool(suggest_tracks_for_slot_tool());
    registry.register_tool(find_similar_tracks_tool());
    registry.register_tool(get_track_details_tool());
}

fn default_limit() -> usize {
    20
}

fn parse_intensity(label: Option<&str>) -> Result<Vec<Intensity>, McpError> {
    match label.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(Vec::new()),
        Some(label) => Intensity::from_db_str(label)
            .map(|i| vec![i])
            .ok_or_else(|| McpError::InvalidParams(format!("unknown intensity '{}'", label))),
    }
}

// ============================================================================
// search_tracks
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchTracksParams {
    #[serde(default)]
    bpm_min: Option<f64>,
    #[serde(default)]
    bpm_max: Option<f64>,
    #[serde(default)]
    intensity: Option<String>,
    #[serde(default)]
    track_type: Option<String>,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    max_duration_minutes: Option<f64>,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Serialize)]
struct SearchTracksResult {
    count: usize,
    tracks: Vec<Track>,
}

fn search_tracks_tool() -> RegisteredTool {
    ToolBuilder::new("search_tracks")
        .description("Search catalog tracks by BPM, intensity, type, position, artist or keyword")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "bpm_min": { "type": "number" },
                "bpm_max": { "type": "number" },
                "intensity": {
                    "type": "string",
                    "enum": ["low", "medium", "high", "extreme"]
                },
                "track_type": {
                    "type": "string",
                    "description": "Track type label, e.g. 'climb', 'sprint', 'warmup'"
                },
                "position": {
                    "type": "string",
                    "description": "Riding position, e.g. 'seated' or 'standing'"
                },
                "artist": { "type": "string" },
                "keyword": {
                    "type": "string",
                    "description": "Matched against title, artist, album, focus area and notes"
                },
                "max_duration_minutes": { "type": "number" },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of tracks (default 20)",
                    "minimum": 1,
                    "maximum": 50
                }
            }
        }))
        .build(search_tracks_handler)
}

async fn search_tracks_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SearchTracksParams = parse_args(params)?;

    let filters = TrackFilters {
        bpm_min: params.bpm_min,
        bpm_max: params.bpm_max,
        intensities: parse_intensity(params.intensity.as_deref())?,
        track_types: params.track_type.into_iter().collect(),
        position: params.position,
        artist: params.artist,
        keyword: params.keyword,
        max_duration_minutes: params.max_duration_minutes,
        limit: Some(params.limit.clamp(1, MAX_TOOL_LIMIT)),
        ..Default::default()
    };
    let tracks = ctx.query(move |catalog| catalog.find_tracks(&filters)).await?;

    json_result(&SearchTracksResult {
        count: tracks.len(),
        tracks,
    })
}

// ============================================================================
// suggest_tracks_for_slot
// ============================================================================

#[derive(Debug, Deserialize)]
struct SuggestForSlotParams {
    role: String,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(default)]
    audience: Option<String>,
    #[serde(default)]
    target_minutes: Option<f64>,
    #[serde(default)]
    preferred_artists: Vec<String>,
    #[serde(default)]
    excluded_artists: Vec<String>,
    #[serde(default)]
    preferred_genres: Vec<String>,
    #[serde(default)]
    excluded_genres: Vec<String>,
    #[serde(default = "default_suggest_limit")]
    limit: usize,
}

fn default_suggest_limit() -> usize {
    5
}

#[derive(Debug, Serialize)]
struct SuggestForSlotResult {
    role: SlotRole,
    difficulty: String,
    bpm_min: f64,
    bpm_max: f64,
    intensities: Vec<Intensity>,
    filter_tier: Option<FilterTier>,
    candidates: Vec<CandidateSummary>,
}

fn suggest_tracks_for_slot_tool() -> RegisteredTool {
    ToolBuilder::new("suggest_tracks_for_slot")
        .description("Ranked catalog candidates for one slot of a class, using stored feedback")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "role": {
                    "type": "string",
                    "description": "Slot role or phase label: warmup, build, climb, \
                                    intervals, sprint, recovery, cooldown"
                },
                "difficulty": {
                    "type": "string",
                    "enum": ["beginner", "intermediate", "advanced", "expert"]
                },
                "audience": { "type": "string" },
                "target_minutes": { "type": "number" },
                "preferred_artists": { "type": "array", "items": { "type": "string" } },
                "excluded_artists": { "type": "array", "items": { "type": "string" } },
                "preferred_genres": { "type": "array", "items": { "type": "string" } },
                "excluded_genres": { "type": "array", "items": { "type": "string" } },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of candidates (default 5)",
                    "minimum": 1,
                    "maximum": 50
                }
            },
            "required": ["role"]
        }))
        .build(suggest_tracks_for_slot_handler)
}

async fn suggest_tracks_for_slot_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: SuggestForSlotParams = parse_args(params)?;
    let settings = ctx.assembler.settings();

    let target_minutes = params
        .target_minutes
        .unwrap_or(settings.planner.target_track_minutes);
    let validated = PlaylistRequest {
        duration_minutes: target_minutes,
        difficulty: params.difficulty,
        audience: params.audience,
        preferred_artists: params.preferred_artists,
        excluded_artists: params.excluded_artists,
        preferred_genres: params.preferred_genres,
        excluded_genres: params.excluded_genres,
        ..Default::default()
    }
    .validate(&settings.request)
    .map_err(McpError::InvalidParams)?;

    let role = SlotRole::from_label(&params.role);
    let slot = Slot {
        ordinal: 1,
        phase_index: 0,
        phase_label: params.role.trim().to_string(),
        role,
        target_minutes,
        bpm: role.bpm_band(),
        intensities: role.intensity_band(validated.difficulty),
    };

    let ranking = settings.ranking.clone();
    let selection = settings.selection.clone();
    let preferences = validated.preferences.clone();
    let query_slot = slot.clone();
    let (tier, ranked) = ctx
        .query(move |catalog| {
            let ranker = FeedbackRanker::new(catalog.list_feedback()?, ranking);
            let candidates = TrackSelector::new(catalog, &ranker, &preferences, &selection)
                .ranked_candidates(&query_slot, &ExclusionSet::new(), f64::INFINITY)?;
            Ok(candidates)
        })
        .await?;

    json_result(&SuggestForSlotResult {
        role,
        difficulty: validated.difficulty.to_string(),
        bpm_min: slot.bpm.min,
        bpm_max: slot.bpm.max,
        intensities: slot.intensities.clone(),
        filter_tier: tier,
        candidates: ranked
            .iter()
            .take(params.limit.clamp(1, MAX_TOOL_LIMIT))
            .map(CandidateSummary::from)
            .collect(),
    })
}

// ============================================================================
// find_similar_tracks
// ============================================================================

#[derive(Debug, Deserialize)]
struct FindSimilarParams {
    title: String,
    #[serde(default = "default_bpm_window")]
    bpm_window: f64,
    #[serde(default = "default_similar_limit")]
    limit: usize,
}

fn default_bpm_window() -> f64 {
    5.0
}

fn default_similar_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
struct FindSimilarResult {
    reference: Track,
    similar: Vec<Track>,
}

fn find_similar_tracks_tool() -> RegisteredTool {
    ToolBuilder::new("find_similar_tracks")
        .description("Tracks with a BPM close to a reference track and the same intensity")
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title (or part of it) of the reference track"
                },
                "bpm_window": {
                    "type": "number",
                    "description": "Allowed BPM difference either way (default 5)"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 50
                }
            },
            "required": ["title"]
        }))
        .build(find_similar_tracks_handler)
}

async fn find_similar_tracks_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: FindSimilarParams = parse_args(params)?;
    if !params.bpm_window.is_finite() || params.bpm_window < 0.0 {
        return Err(McpError::InvalidParams(
            "bpm_window must be a non-negative number".to_string(),
        ));
    }

    let title = params.title.clone();
    let Some(reference) = ctx
        .query(move |catalog| catalog.get_track_by_title(&title))
        .await?
    else {
        return Ok(ToolsCallResult::error(format!(
            "No track found matching '{}'",
            params.title
        )));
    };
    let Some(bpm) = reference.bpm else {
        return Ok(ToolsCallResult::error(format!(
            "'{}' has no BPM to compare against",
            reference.title
        )));
    };

    let limit = params.limit.clamp(1, MAX_TOOL_LIMIT);
    let mut filters = TrackFilters::default()
        .with_bpm_range(bpm - params.bpm_window, bpm + params.bpm_window)
        .with_limit(limit + 1);
    if let Some(intensity) = reference.intensity {
        filters = filters.with_intensities(&[intensity]);
    }

    let mut similar: Vec<Track> = ctx
        .query(move |catalog| catalog.find_tracks(&filters))
        .await?
        .into_iter()
        .filter(|t| t.id != reference.id)
        .collect();
    similar.sort_by(|a, b| {
        let da = a.bpm.map_or(f64::INFINITY, |x| (x - bpm).abs());
        let db = b.bpm.map_or(f64::INFINITY, |x| (x - bpm).abs());
        da.total_cmp(&db).then_with(|| a.id.cmp(&b.id))
    });
    similar.truncate(limit);

    json_result(&FindSimilarResult { reference, similar })
}

// ============================================================================
// get_track_details
// ============================================================================

#[derive(Debug, Deserialize)]
struct TrackDetailsParams {
    title: String,
}

fn get_track_details_tool() -> RegisteredTool {
    ToolBuilder::new("get_track_details")
        .description(
            "Full catalog record, choreography included, \
             for the first track whose title contains the text",
        )
        .input_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" }
            },
            "required": ["title"]
        }))
        .build(get_track_details_handler)
}

async fn get_track_details_handler(ctx: ToolContext, params: Value) -> ToolResult {
    let params: TrackDetailsParams = parse_args(params)?;
    let title = params.title.clone();
    match ctx
        .query(move |catalog| catalog.get_track_by_title(&title))
        .await?
    {
        Some(track) => json_result(&track),
        None => Ok(ToolsCallResult::error(format!(
            "No track found matching '{}'",
            params.title
        ))),
    }
}
