//! Playlist requests as they arrive from the serving boundary, and their
//! validated form.

use crate::config::RequestSettings;
use crate::planner::IntensityArc;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            "expert" => Some(Difficulty::Expert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A playlist request. Every field but the duration may be omitted.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaylistRequest {
    pub duration_minutes: f64,
    pub difficulty: Option<String>,
    pub audience: Option<String>,
    pub theme: Option<String>,
    pub vibe: Option<String>,
    pub intensity_arc: Option<IntensityArc>,
    pub preferred_genres: Vec<String>,
    pub excluded_genres: Vec<String>,
    pub preferred_artists: Vec<String>,
    pub excluded_artists: Vec<String>,
    /// Free text, passed to gap-fill and echoed as the routine description.
    pub user_goal: Option<String>,
    /// Overrides the configured hybrid default when set.
    pub hybrid: Option<bool>,
    pub debug: bool,
}

/// Taste constraints that shape candidate filtering and ranking.
/// Strings are trimmed and lowercased; empty entries are dropped.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Preferences {
    pub audience: Option<String>,
    pub theme: Option<String>,
    pub vibe: Option<String>,
    pub preferred_genres: Vec<String>,
    pub excluded_genres: Vec<String>,
    pub preferred_artists: Vec<String>,
    pub excluded_artists: Vec<String>,
}

impl Preferences {
    pub fn is_excluded_artist(&self, artist: &str) -> bool {
        let artist = artist.trim().to_lowercase();
        !artist.is_empty() && self.excluded_artists.iter().any(|a| artist.contains(a.as_str()))
    }

    pub fn is_preferred_artist(&self, artist: &str) -> bool {
        let artist = artist.trim().to_lowercase();
        !artist.is_empty() && self.preferred_artists.iter().any(|a| artist.contains(a.as_str()))
    }

    /// Does the (lowercased) descriptive text mention an excluded genre?
    pub fn mentions_excluded_genre(&self, text: &str) -> bool {
        self.excluded_genres.iter().any(|g| text.contains(g.as_str()))
    }

    pub fn mentions_preferred_genre(&self, text: &str) -> bool {
        self.preferred_genres.iter().any(|g| text.contains(g.as_str()))
    }

    /// Does the text mention any word of the theme (words under 3 letters ignored)?
    pub fn matches_theme(&self, text: &str) -> bool {
        self.theme.as_deref().is_some_and(|theme| {
            theme
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| w.chars().count() >= 3)
                .any(|w| text.contains(w))
        })
    }
}

/// A request that passed validation.
#[derive(Clone, Debug)]
pub struct ValidatedRequest {
    pub duration_minutes: f64,
    pub difficulty: Difficulty,
    pub preferences: Preferences,
    pub intensity_arc: Option<IntensityArc>,
    pub user_goal: Option<String>,
    pub hybrid: Option<bool>,
    pub debug: bool,
}

fn clean_label(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn clean_set(values: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

impl PlaylistRequest {
    /// Check the request, rejecting anything that cannot be planned.
    /// Labels are never coerced: an unknown difficulty or audience is an error.
    pub fn validate(&self, settings: &RequestSettings) -> Result<ValidatedRequest, String> {
        let duration = self.duration_minutes;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(format!(
                "duration_minutes must be a positive number, got {}",
                duration
            ));
        }
        if duration > settings.max_duration_minutes {
            return Err(format!(
                "duration_minutes must not exceed {}, got {}",
                settings.max_duration_minutes, duration
            ));
        }

        let difficulty = match clean_label(self.difficulty.as_deref()) {
            None => settings.default_difficulty,
            Some(label) => Difficulty::parse(&label).ok_or_else(|| {
                format!(
                    "unknown difficulty '{}', expected one of: {}",
                    label,
                    Difficulty::ALL
                        .iter()
                        .map(Difficulty::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })?,
        };

        let audience = match clean_label(self.audience.as_deref()) {
            None => None,
            Some(label) if settings.audiences.is_empty() => Some(label),
            Some(label) => Some(
                settings
                    .audiences
                    .iter()
                    .find(|known| known.eq_ignore_ascii_case(&label))
                    .cloned()
                    .ok_or_else(|| {
                        format!(
                            "unknown audience '{}', expected one of: {}",
                            label,
                            settings.audiences.join(", ")
                        )
                    })?,
            ),
        };

        Ok(ValidatedRequest {
            duration_minutes: duration,
            difficulty,
            preferences: Preferences {
                audience,
                theme: clean_label(self.theme.as_deref()).map(|t| t.to_lowercase()),
                vibe: clean_label(self.vibe.as_deref()),
                preferred_genres: clean_set(&self.preferred_genres),
                excluded_genres: clean_set(&self.excluded_genres),
                preferred_artists: clean_set(&self.preferred_artists),
                excluded_artists: clean_set(&self.excluded_artists),
            },
            intensity_arc: self.intensity_arc.clone(),
            user_goal: clean_label(self.user_goal.as_deref()),
            hybrid: self.hybrid,
            debug: self.debug,
        })
    }
}
