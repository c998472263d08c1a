//! Catalog models for the SQLite-backed track store.
//!
//! Every attribute the sync process may leave empty is an `Option`; values
//! that break the model invariants (negative durations, non-positive BPM) are
//! dropped to `None` when rows are read, never deeper in the engine.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// =============================================================================
// Enumerations
// =============================================================================

/// Track intensity, ordered from easiest to hardest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Intensity {
    pub const ALL: [Intensity; 4] = [
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
        Intensity::Extreme,
    ];

    /// Parse the database representation. Unknown labels yield `None`.
    pub fn from_db_str(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|i| i.db_labels().contains(&s.as_str()))
    }

    pub fn to_db_str(&self) -> &'static str {
        self.db_labels()[0]
    }

    /// Every stored label read as this intensity, canonical first.
    pub fn db_labels(&self) -> &'static [&'static str] {
        match self {
            Intensity::Low => &["low"],
            Intensity::Medium => &["medium", "moderate"],
            Intensity::High => &["high"],
            Intensity::Extreme => &["extreme", "max"],
        }
    }
}

/// A feedback rating as stored by the sync process.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Up,
    Down,
    /// Ordinal scale, 1 to 5.
    Stars(u8),
}

impl Rating {
    pub fn from_db_str(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "up" | "thumbs_up" | "like" => Some(Rating::Up),
            "down" | "thumbs_down" | "dislike" => Some(Rating::Down),
            other => other
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=5).contains(n))
                .map(Rating::Stars),
        }
    }

    pub fn to_db_string(&self) -> String {
        match self {
            Rating::Up => "up".to_string(),
            Rating::Down => "down".to_string(),
            Rating::Stars(n) => n.to_string(),
        }
    }

    /// Signed strength of the rating: +1 for up, -1 for down, stars mapped
    /// linearly so that 3 stars is neutral.
    pub fn polarity(&self) -> f64 {
        match self {
            Rating::Up => 1.0,
            Rating::Down => -1.0,
            Rating::Stars(n) => (*n as f64 - 3.0) / 2.0,
        }
    }
}

// =============================================================================
// Tracks
// =============================================================================

/// One timestamped choreography cue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoreographyCue {
    #[serde(alias = "time", deserialize_with = "lenient_string")]
    pub timestamp: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub position: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub resistance: Option<String>,
    #[serde(alias = "cadence", deserialize_with = "lenient_string")]
    pub cadence_range: Option<String>,
    #[serde(alias = "notes", alias = "cue", deserialize_with = "lenient_string")]
    pub note: Option<String>,
}

/// Accept strings, numbers and null for free-form cue fields.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Catalog-local numeric id.
    pub id: i64,
    /// Id in the upstream catalog the sync process mirrors.
    pub external_id: Option<String>,
    pub spotify_id: Option<String>,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_minutes: Option<f64>,
    pub bpm: Option<f64>,
    pub intensity: Option<Intensity>,
    pub track_type: Option<String>,
    pub focus_area: Option<String>,
    pub position: Option<String>,
    pub resistance_min: Option<f64>,
    pub resistance_max: Option<f64>,
    pub cadence_min: Option<f64>,
    pub cadence_max: Option<f64>,
    pub base_rpm: Option<f64>,
    pub base_effort_level: Option<f64>,
    pub choreography: Vec<ChoreographyCue>,
    pub cues: Vec<String>,
    pub notes: Option<String>,
    pub spotify_url: Option<String>,
}

impl Track {
    /// Free text the genre and theme heuristics look at.
    pub fn descriptive_text(&self) -> String {
        [
            self.track_type.as_deref(),
            self.focus_area.as_deref(),
            self.notes.as_deref(),
            self.album.as_deref(),
        ]
        .iter()
        .flatten()
        .map(|s| s.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Keep a duration only if it is a finite, non-negative number.
pub fn valid_duration(value: Option<f64>) -> Option<f64> {
    value.filter(|d| d.is_finite() && *d >= 0.0)
}

/// Keep a BPM only if it is a finite, positive number.
pub fn valid_bpm(value: Option<f64>) -> Option<f64> {
    value.filter(|b| b.is_finite() && *b > 0.0)
}

/// Parse the choreography JSON column. Entries that are not objects, or
/// a column that is not a JSON list at all, yield no cues.
pub fn parse_choreography(raw: Option<&str>) -> Vec<ChoreographyCue> {
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<ChoreographyCue>(item).ok())
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed choreography column");
            Vec::new()
        }
    }
}

/// Parse the cues column, which is either a JSON list of strings or plain text.
pub fn parse_cues(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Err(_) => vec![raw.to_string()],
    }
}

// =============================================================================
// Routines
// =============================================================================

/// Link from a routine to one of its tracks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutineTrack {
    /// Sequence key, strictly increasing within a routine.
    pub order: i64,
    /// Authoritative track reference, always present.
    pub external_track_id: String,
    /// Resolved catalog id; `None` marks a dangling reference.
    pub local_track_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRoutine {
    pub id: i64,
    pub external_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub theme: Option<String>,
    pub intensity_arc: Option<String>,
    pub class_summary: Option<String>,
    pub total_duration_minutes: Option<f64>,
    pub difficulty: Option<String>,
    pub spotify_playlist_id: Option<String>,
    pub tags: Vec<String>,
    pub tracks: Vec<RoutineTrack>,
}

// =============================================================================
// Feedback
// =============================================================================

/// One stored feedback row. Empty context/audience labels are read as `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRow {
    pub track_title: String,
    pub track_artist: Option<String>,
    pub spotify_id: Option<String>,
    pub rating: Rating,
    pub context: Option<String>,
    pub audience: Option<String>,
}

/// Feedback to record against the first track whose title contains
/// `title_fragment`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewFeedback {
    pub title_fragment: String,
    pub rating: Rating,
    pub context: Option<String>,
    pub audience: Option<String>,
}

/// The stored row after an insert or a refresh of an existing one.
#[derive(Clone, Debug, Serialize)]
pub struct RecordedFeedback {
    pub id: i64,
    pub track_title: String,
    pub track_artist: Option<String>,
    pub rating: Rating,
    pub context: Option<String>,
    pub audience: Option<String>,
}

/// Filters for the top-rated listing.
#[derive(Clone, Debug, Default)]
pub struct TopRatedQuery {
    pub rating: Option<String>,
    pub context: Option<String>,
    pub audience: Option<String>,
    pub limit: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TopRatedTrack {
    pub track_title: String,
    pub track_artist: Option<String>,
    pub context: Option<String>,
    pub audience: Option<String>,
    pub rating: String,
    pub rating_count: i64,
    pub bpm: Option<f64>,
    pub intensity: Option<String>,
    pub track_type: Option<String>,
    pub duration_minutes: Option<f64>,
    pub spotify_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedbackTotals {
    pub total_feedback: i64,
    pub total_up: i64,
    pub total_down: i64,
    pub unique_tracks: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ContextFeedbackCount {
    pub context: String,
    pub up_count: i64,
    pub down_count: i64,
    pub unique_tracks: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedbackSummary {
    pub overall: FeedbackTotals,
    pub by_context: Vec<ContextFeedbackCount>,
}

// =============================================================================
// Statistics
// =============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TrackStats {
    pub total_tracks: i64,
    pub tracks_with_bpm: i64,
    pub tracks_with_choreography: i64,
    pub min_bpm: Option<f64>,
    pub max_bpm: Option<f64>,
    pub avg_bpm: Option<f64>,
    pub total_duration_minutes: Option<f64>,
    pub avg_duration_minutes: Option<f64>,
    pub by_intensity: Vec<LabelCount>,
    pub by_track_type: Vec<LabelCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_parsing_is_case_insensitive() {
        assert_eq!(Intensity::from_db_str(" High "), Some(Intensity::High));
        assert_eq!(Intensity::from_db_str("EXTREME"), Some(Intensity::Extreme));
        assert_eq!(Intensity::from_db_str("brutal"), None);
    }

    #[test]
    fn intensity_aliases_parse_to_canonical_labels() {
        assert_eq!(Intensity::from_db_str("Moderate"), Some(Intensity::Medium));
        assert_eq!(Intensity::from_db_str("max"), Some(Intensity::Extreme));
        assert_eq!(Intensity::Medium.to_db_str(), "medium");
        for intensity in Intensity::ALL {
            for label in intensity.db_labels() {
                assert_eq!(Intensity::from_db_str(label), Some(intensity));
            }
        }
    }

    #[test]
    fn rating_polarity() {
        assert_eq!(Rating::from_db_str("up").map(|r| r.polarity()), Some(1.0));
        assert_eq!(Rating::from_db_str("Down").map(|r| r.polarity()), Some(-1.0));
        assert_eq!(Rating::from_db_str("3").map(|r| r.polarity()), Some(0.0));
        assert_eq!(Rating::from_db_str("5").map(|r| r.polarity()), Some(1.0));
        assert_eq!(Rating::from_db_str("9"), None);
        assert_eq!(Rating::from_db_str("meh"), None);
    }

    #[test]
    fn boundary_validation_drops_invalid_numbers() {
        assert_eq!(valid_duration(Some(-1.0)), None);
        assert_eq!(valid_duration(Some(0.0)), Some(0.0));
        assert_eq!(valid_bpm(Some(0.0)), None);
        assert_eq!(valid_bpm(Some(f64::NAN)), None);
        assert_eq!(valid_bpm(Some(128.0)), Some(128.0));
    }

    #[test]
    fn choreography_parsing_is_lenient() {
        let raw = r#"[
            {"timestamp": "0:30", "position": "seated", "resistance": 4,
             "cadence_range": "80-90", "note": "settle in"},
            "not an object",
            {"time": 90, "cue": "stand up"}
        ]"#;
        let cues = parse_choreography(Some(raw));
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].resistance.as_deref(), Some("4"));
        assert_eq!(cues[1].timestamp.as_deref(), Some("90"));
        assert_eq!(cues[1].note.as_deref(), Some("stand up"));

        assert!(parse_choreography(Some("{broken")).is_empty());
        assert!(parse_choreography(None).is_empty());
    }

    #[test]
    fn cues_accept_list_or_text() {
        assert_eq!(
            parse_cues(Some(r#"["Push", "", "Breathe"]"#)),
            vec!["Push".to_string(), "Breathe".to_string()]
        );
        assert_eq!(parse_cues(Some("Hold the climb")), vec!["Hold the climb"]);
        assert!(parse_cues(Some("  ")).is_empty());
    }
}
