//! Attribute filters for catalog track queries.

use super::models::Intensity;
use rusqlite::types::Value as SqlValue;
use serde::Deserialize;

/// Default number of rows returned by a find.
pub const DEFAULT_FIND_LIMIT: usize = 50;

/// Hard cap on rows returned by a single find.
pub const MAX_FIND_LIMIT: usize = 500;

/// Subset of track attributes to match. Unset fields do not constrain.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackFilters {
    pub bpm_min: Option<f64>,
    pub bpm_max: Option<f64>,
    /// Matches tracks whose intensity is any of these.
    pub intensities: Vec<Intensity>,
    /// Matches tracks whose type contains any of these labels.
    pub track_types: Vec<String>,
    pub position: Option<String>,
    pub artist: Option<String>,
    /// Free text matched against title, artist, album, focus area and notes.
    pub keyword: Option<String>,
    /// Tracks longer than this are skipped. Tracks of unknown length pass.
    pub max_duration_minutes: Option<f64>,
    pub limit: Option<usize>,
    /// Artists containing any of these are skipped.
    #[serde(skip)]
    pub excluded_artists: Vec<String>,
    /// Tracks whose type, focus area, notes or album mention any of these are skipped.
    #[serde(skip)]
    pub excluded_terms: Vec<String>,
    /// Local track ids to skip.
    #[serde(skip)]
    pub excluded_ids: Vec<i64>,
}

impl TrackFilters {
    pub fn with_bpm_range(mut self, min: f64, max: f64) -> Self {
        self.bpm_min = Some(min);
        self.bpm_max = Some(max);
        self
    }

    pub fn with_intensities(mut self, intensities: &[Intensity]) -> Self {
        self.intensities = intensities.to_vec();
        self
    }

    pub fn with_track_types(mut self, types: &[&str]) -> Self {
        self.track_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_max_duration(mut self, minutes: f64) -> Self {
        self.max_duration_minutes = Some(minutes);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn without_artists(mut self, artists: &[String]) -> Self {
        self.excluded_artists = artists.to_vec();
        self
    }

    pub fn without_terms(mut self, terms: &[String]) -> Self {
        self.excluded_terms = terms.to_vec();
        self
    }

    pub fn without_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.excluded_ids = ids.into_iter().collect();
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_FIND_LIMIT)
            .clamp(1, MAX_FIND_LIMIT)
    }

    /// Build the WHERE clause (without the keyword) and its positional values.
    pub(crate) fn where_clause(&self) -> (String, Vec<SqlValue>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(min) = self.bpm_min {
            conditions.push("bpm >= ?".to_string());
            values.push(SqlValue::Real(min));
        }
        if let Some(max) = self.bpm_max {
            conditions.push("bpm <= ?".to_string());
            values.push(SqlValue::Real(max));
        }
        if !self.intensities.is_empty() {
            // Aliases such as "moderate" are bound next to their canonical label.
            let labels: Vec<&str> = self
                .intensities
                .iter()
                .flat_map(|i| i.db_labels().iter().copied())
                .collect();
            let placeholders = vec!["?"; labels.len()].join(", ");
            conditions.push(format!("LOWER(TRIM(intensity)) IN ({})", placeholders));
            values.extend(labels.iter().map(|l| SqlValue::Text(l.to_string())));
        }
        let types: Vec<&String> = self
            .track_types
            .iter()
            .filter(|t| !t.trim().is_empty())
            .collect();
        if !types.is_empty() {
            let any = vec!["track_type LIKE ? ESCAPE '\\'"; types.len()].join(" OR ");
            conditions.push(format!("({})", any));
            values.extend(types.iter().map(|t| SqlValue::Text(like_pattern(t))));
        }
        if let Some(position) = self.position.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("position LIKE ? ESCAPE '\\'".to_string());
            values.push(SqlValue::Text(like_pattern(position)));
        }
        if let Some(artist) = self.artist.as_deref().filter(|s| !s.trim().is_empty()) {
            conditions.push("artist LIKE ? ESCAPE '\\'".to_string());
            values.push(SqlValue::Text(like_pattern(artist)));
        }
        if let Some(keyword) = self.keyword.as_deref().filter(|s| !s.trim().is_empty()) {
            let columns = ["title", "artist", "album", "focus_area", "notes"];
            let any = columns
                .iter()
                .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
                .collect::<Vec<_>>()
                .join(" OR ");
            conditions.push(format!("({})", any));
            let pattern = like_pattern(keyword);
            values.extend(columns.iter().map(|_| SqlValue::Text(pattern.clone())));
        }
        if let Some(max) = self.max_duration_minutes {
            conditions.push("(duration_minutes IS NULL OR duration_minutes <= ?)".to_string());
            values.push(SqlValue::Real(max));
        }
        for artist in self.excluded_artists.iter().filter(|a| !a.trim().is_empty()) {
            conditions.push("COALESCE(artist, '') NOT LIKE ? ESCAPE '\\'".to_string());
            values.push(SqlValue::Text(like_pattern(artist)));
        }
        for term in self.excluded_terms.iter().filter(|t| !t.trim().is_empty()) {
            conditions.push(format!("{} NOT LIKE ? ESCAPE '\\'", DESCRIPTIVE_TEXT));
            values.push(SqlValue::Text(like_pattern(term)));
        }
        if !self.excluded_ids.is_empty() {
            let placeholders = vec!["?"; self.excluded_ids.len()].join(", ");
            conditions.push(format!("id NOT IN ({})", placeholders));
            values.extend(self.excluded_ids.iter().map(|id| SqlValue::Integer(*id)));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, values)
    }
}

/// The columns a track's descriptive text is made of, joined for matching.
const DESCRIPTIVE_TEXT: &str = "(COALESCE(track_type, '') || ' ' || COALESCE(focus_area, '') \
     || ' ' || COALESCE(notes, '') || ' ' || COALESCE(album, ''))";

/// `%text%` with LIKE wildcards in the input escaped.
pub(crate) fn like_pattern(text: &str) -> String {
    let escaped = text
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
