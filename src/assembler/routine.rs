//! The routine a build produces, and the diagnostics that explain it.

use crate::catalog_store::Intensity;
use crate::gap_fill::TrackStub;
use crate::identity::CanonicalId;
use crate::planner::{SlotPlan, SlotRole};
use crate::request::Difficulty;
use crate::selector::{CandidateSummary, FilterTier};
use serde::Serialize;

pub const RESISTANCE_SCALE_NOTES: &str = "1 = flat road, 10 = max hill";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Catalog,
    GapFill,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoutineEntry {
    /// 1-based play order.
    pub order: usize,
    pub canonical_id: CanonicalId,
    pub local_id: Option<i64>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Known length of the track, if any.
    pub duration_minutes: Option<f64>,
    /// Length counted against the class duration.
    pub estimated_minutes: f64,
    pub bpm: Option<f64>,
    pub intensity: Option<Intensity>,
    pub slot_ordinal: usize,
    pub slot_role: SlotRole,
    pub phase: String,
    pub source: TrackSource,
    pub spotify_url: Option<String>,
}

/// Why a slot stayed empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UnfilledReason {
    NoCandidate,
    CatalogError(String),
    ServiceError(String),
    MalformedResponse(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct UnfilledSlot {
    pub slot_ordinal: usize,
    pub phase: String,
    pub slot_role: SlotRole,
    pub target_minutes: f64,
    pub reason: UnfilledReason,
}

#[derive(Clone, Debug, Serialize)]
pub struct RejectedSuggestion {
    pub title: String,
    pub artist: String,
    pub reason: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct GapFillDiagnostics {
    pub source: String,
    /// `suggestions`, `empty`, `service_error` or `malformed`.
    pub outcome: &'static str,
    pub detail: Option<String>,
    pub suggestions: Vec<TrackStub>,
    pub rejected: Vec<RejectedSuggestion>,
    /// Canonical id of the suggestion that filled the slot.
    pub accepted: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SlotDiagnostics {
    pub slot_ordinal: usize,
    pub slot_role: SlotRole,
    pub phase: String,
    pub target_minutes: f64,
    pub remaining_minutes: f64,
    pub filter_tier: Option<FilterTier>,
    pub candidate_count: usize,
    pub top_candidates: Vec<CandidateSummary>,
    pub catalog_error: Option<String>,
    pub gap_fill: Option<GapFillDiagnostics>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BuildDiagnostics {
    pub plan: SlotPlan,
    pub hybrid_requested: bool,
    pub hybrid_active: bool,
    pub feedback_rows: usize,
    pub slots: Vec<SlotDiagnostics>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub theme: String,
    pub intensity_arc: String,
    pub resistance_scale_notes: &'static str,
    pub difficulty: Difficulty,
    pub audience: Option<String>,
    pub class_summary: String,
    pub tags: Vec<String>,
    pub requested_duration_minutes: f64,
    pub achieved_duration_minutes: f64,
    pub hybrid: bool,
    pub created_at: String,
    pub entries: Vec<RoutineEntry>,
    pub unfilled_slots: Vec<UnfilledSlot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<BuildDiagnostics>,
}

impl Routine {
    /// Canonical ids of the placed tracks, in order.
    pub fn track_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.canonical_id.to_string())
            .collect()
    }
}

/// Minutes for display: whole numbers without decimals, otherwise one decimal.
pub fn format_minutes(minutes: f64) -> String {
    let rounded = (minutes * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.1}", rounded)
    }
}

pub(crate) fn routine_name(duration: f64, difficulty: Difficulty, theme: Option<&str>) -> String {
    let base = format!("{}-min {} ride", format_minutes(duration), difficulty);
    match theme {
        Some(theme) => format!("{}: {}", base, theme),
        None => base,
    }
}

pub(crate) fn class_summary(
    track_count: usize,
    requested: f64,
    achieved: f64,
    audience: Option<&str>,
) -> String {
    format!(
        "{} tracks selected for a {}-minute target ({} minutes estimated). Audience: {}.",
        track_count,
        format_minutes(requested),
        format_minutes(achieved),
        audience.unwrap_or("mixed")
    )
}

pub(crate) fn routine_tags(
    difficulty: Difficulty,
    audience: Option<&str>,
    theme: Option<&str>,
) -> Vec<String> {
    let mut tags = vec!["ai-generated".to_string(), difficulty.to_string()];
    for tag in [audience, theme].into_iter().flatten() {
        if !tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            tags.push(tag.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutes_formatting() {
        assert_eq!(format_minutes(45.0), "45");
        assert_eq!(format_minutes(44.96), "45");
        assert_eq!(format_minutes(37.25), "37.3");
    }

    #[test]
    fn metadata_text() {
        assert_eq!(
            routine_name(45.0, Difficulty::Intermediate, None),
            "45-min intermediate ride"
        );
        assert_eq!(
            routine_name(30.0, Difficulty::Expert, Some("80s rock")),
            "30-min expert ride: 80s rock"
        );
        assert_eq!(
            class_summary(11, 45.0, 43.5, None),
            "11 tracks selected for a 45-minute target (43.5 minutes estimated). Audience: mixed."
        );
        assert_eq!(
            routine_tags(Difficulty::Beginner, Some("50+"), None),
            vec!["ai-generated", "beginner", "50+"]
        );
    }
}
