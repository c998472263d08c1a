use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub catalog_db: Option<String>,
    pub read_pool_size: Option<usize>,
    pub hybrid: Option<bool>,

    // Engine sections
    pub planner: Option<PlannerConfig>,
    pub ranking: Option<RankingConfig>,
    pub selection: Option<SelectionConfig>,
    pub gap_fill: Option<GapFillConfig>,
    pub request: Option<RequestConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PlannerConfig {
    pub warmup_minutes: Option<f64>,
    pub cooldown_minutes: Option<f64>,
    pub target_track_minutes: Option<f64>,
    pub min_phase_minutes: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RankingConfig {
    pub match_weight: Option<f64>,
    pub agnostic_weight: Option<f64>,
    pub mismatch_weight: Option<f64>,
    pub preferred_artist_boost: Option<f64>,
    pub preferred_genre_boost: Option<f64>,
    pub theme_match_boost: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SelectionConfig {
    pub duration_tolerance_minutes: Option<f64>,
    pub candidate_limit: Option<usize>,
    pub debug_candidates: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct GapFillConfig {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub temperature: Option<f32>,
    pub max_suggestions: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RequestConfig {
    pub max_duration_minutes: Option<f64>,
    pub default_difficulty: Option<String>,
    /// Accepted audience labels. An empty list accepts any label.
    pub audiences: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
