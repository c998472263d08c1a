//! Whole-class recommendations: the suggestion service proposes the tracks,
//! the catalog fills in what it knows about them.

use super::{BuildError, PlaylistAssembler, RejectedSuggestion};
use crate::catalog_store::Track;
use crate::feedback::FeedbackSignals;
use crate::gap_fill::{ClassBrief, GapFillContext, GapFillOutcome, TrackStub};
use crate::planner::plan_slots;
use crate::request::{PlaylistRequest, Preferences};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

/// Labels a recommendation can carry. Any other focus reads as `build`.
pub const RECOMMENDATION_TYPES: [&str; 6] =
    ["warmup", "build", "climb", "sprint", "recovery", "cooldown"];

const MIN_TRACKS: usize = 8;
const MAX_TRACKS: usize = 20;
const MINUTES_PER_TRACK: f64 = 4.0;

#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub artist: String,
    pub bpm: Option<f64>,
    pub suggest_type: &'static str,
    /// The catalog row, when the suggestion is a known track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<Track>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassRecommendations {
    pub source: String,
    pub intensity_arc: String,
    pub target_count: usize,
    /// `suggestions`, `empty`, `service_error` or `malformed`.
    pub outcome: &'static str,
    pub detail: Option<String>,
    pub in_catalog: usize,
    pub tracks: Vec<Recommendation>,
    pub skipped: Vec<RejectedSuggestion>,
}

/// One track per four minutes of class, between 8 and 20.
pub(crate) fn target_count(duration_minutes: f64) -> usize {
    ((duration_minutes / MINUTES_PER_TRACK).round() as usize).clamp(MIN_TRACKS, MAX_TRACKS)
}

fn suggest_type(stub: &TrackStub) -> &'static str {
    let focus = stub
        .focus_area
        .as_deref()
        .map(|f| f.trim().to_lowercase())
        .unwrap_or_default();
    RECOMMENDATION_TYPES
        .into_iter()
        .find(|label| *label == focus)
        .unwrap_or("build")
}

fn skip_reason(
    stub: &TrackStub,
    seen: &mut HashSet<(String, String)>,
    preferences: &Preferences,
    signals: &FeedbackSignals,
) -> Option<&'static str> {
    let title = stub.title.trim().to_lowercase();
    let artist = stub.artist.trim().to_lowercase();
    if !seen.insert((title.clone(), artist.clone())) {
        return Some("duplicate");
    }
    if signals.is_disliked(&stub.title, &stub.artist) {
        return Some("disliked");
    }
    // Excluded names match song titles as well as artists.
    let excluded = preferences
        .excluded_artists
        .iter()
        .any(|name| title.contains(name.as_str()) || artist.contains(name.as_str()));
    if excluded {
        return Some("excluded_artist");
    }
    let text = [stub.focus_area.as_deref(), stub.notes.as_deref()]
        .iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if preferences.mentions_excluded_genre(&text) {
        return Some("excluded_genre");
    }
    None
}

impl PlaylistAssembler {
    /// Ask the suggestion service for a whole class, drop what the request
    /// or the feedback rules out, and attach catalog rows to known tracks.
    pub async fn recommend(
        &self,
        request: &PlaylistRequest,
    ) -> Result<ClassRecommendations, BuildError> {
        let filler = self
            .gap_filler
            .as_deref()
            .ok_or(BuildError::NoSuggestionService)?;
        let validated = request
            .validate(&self.settings.request)
            .map_err(BuildError::InvalidRequest)?;
        let plan = plan_slots(
            validated.duration_minutes,
            validated.intensity_arc.as_ref(),
            validated.difficulty,
            &self.settings.planner,
        )
        .map_err(|e| BuildError::InvalidRequest(e.to_string()))?;

        let prefs = &validated.preferences;
        let feedback_rows = self.load_feedback().await;
        let signals = FeedbackSignals::from_rows(&feedback_rows, prefs.audience.as_deref());
        let brief = ClassBrief {
            intensity_arc: plan.arc_text(),
            phases: plan.phases,
            track_count: target_count(validated.duration_minutes),
        };
        let context = GapFillContext {
            duration_minutes: validated.duration_minutes,
            difficulty: validated.difficulty,
            preferences: prefs.clone(),
            user_goal: validated.user_goal.clone(),
            already_chosen: Vec::new(),
            feedback: signals.clone(),
        };

        let mut result = ClassRecommendations {
            source: filler.source(),
            intensity_arc: brief.intensity_arc.clone(),
            target_count: brief.track_count,
            outcome: "suggestions",
            detail: None,
            in_catalog: 0,
            tracks: Vec::new(),
            skipped: Vec::new(),
        };
        let stubs = match filler.recommend(&brief, &context).await {
            GapFillOutcome::Suggestions(stubs) => stubs,
            GapFillOutcome::Empty => {
                result.outcome = "empty";
                return Ok(result);
            }
            GapFillOutcome::ServiceError(detail) => {
                result.outcome = "service_error";
                result.detail = Some(detail);
                return Ok(result);
            }
            GapFillOutcome::Malformed(detail) => {
                result.outcome = "malformed";
                result.detail = Some(detail);
                return Ok(result);
            }
        };

        let mut seen = HashSet::new();
        for stub in stubs {
            if let Some(reason) = skip_reason(&stub, &mut seen, prefs, &signals) {
                result.skipped.push(RejectedSuggestion {
                    title: stub.title,
                    artist: stub.artist,
                    reason,
                });
                continue;
            }
            let track = self.catalog_match(&stub).await;
            if track.is_some() {
                result.in_catalog += 1;
            }
            result.tracks.push(Recommendation {
                suggest_type: suggest_type(&stub),
                bpm: track.as_ref().and_then(|t| t.bpm).or(stub.bpm),
                title: stub.title,
                artist: stub.artist,
                track,
            });
        }

        info!(
            recommended = result.tracks.len(),
            in_catalog = result.in_catalog,
            skipped = result.skipped.len(),
            "Class recommendations ready"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub(title: &str, artist: &str, focus: Option<&str>) -> TrackStub {
        TrackStub {
            title: title.to_string(),
            artist: artist.to_string(),
            duration_minutes: None,
            bpm: None,
            intensity: None,
            focus_area: focus.map(str::to_string),
            notes: None,
        }
    }

    #[test]
    fn target_count_is_clamped() {
        assert_eq!(target_count(20.0), 8);
        assert_eq!(target_count(55.0), 14);
        assert_eq!(target_count(120.0), 20);
    }

    #[test]
    fn unknown_focus_reads_as_build() {
        assert_eq!(suggest_type(&stub("A", "B", Some(" Climb "))), "climb");
        assert_eq!(suggest_type(&stub("A", "B", Some("tempo"))), "build");
        assert_eq!(suggest_type(&stub("A", "B", None)), "build");
    }

    #[test]
    fn excluded_names_match_titles_and_artists() {
        let prefs = Preferences {
            excluded_artists: vec!["queen".to_string()],
            excluded_genres: vec!["polka".to_string()],
            ..Default::default()
        };
        let signals = FeedbackSignals::default();
        let mut seen = HashSet::new();
        let mut reason = |s: TrackStub| skip_reason(&s, &mut seen, &prefs, &signals);

        assert_eq!(reason(stub("Killer Queen", "Tribute", None)), Some("excluded_artist"));
        assert_eq!(reason(stub("Fine", "Band", Some("Polka party"))), Some("excluded_genre"));
        assert_eq!(reason(stub("Fine", "Band", None)), Some("duplicate"));
        assert_eq!(reason(stub("Other", "Band", None)), None);
    }
}
