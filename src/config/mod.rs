mod file_config;

pub use file_config::{
    FileConfig, GapFillConfig, PlannerConfig, RankingConfig, RequestConfig, SelectionConfig,
};

use crate::request::Difficulty;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub catalog_db: Option<PathBuf>,
    pub read_pool_size: usize,
    pub hybrid: bool,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub gap_fill_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_db: PathBuf,
    pub read_pool_size: usize,
    pub engine: EngineSettings,
    pub gap_fill: GapFillSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let catalog_db = file
            .catalog_db
            .map(PathBuf::from)
            .or_else(|| cli.catalog_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "catalog_db must be specified on the command line or in config file"
                )
            })?;
        if !catalog_db.exists() {
            bail!("Catalog database does not exist: {:?}", catalog_db);
        }
        if !catalog_db.is_file() {
            bail!("catalog_db is not a file: {:?}", catalog_db);
        }

        let read_pool_size = file.read_pool_size.unwrap_or(cli.read_pool_size).max(1);

        let planner_file = file.planner.unwrap_or_default();
        let planner_defaults = PlannerSettings::default();
        let planner = PlannerSettings {
            warmup_minutes: planner_file
                .warmup_minutes
                .unwrap_or(planner_defaults.warmup_minutes),
            cooldown_minutes: planner_file
                .cooldown_minutes
                .unwrap_or(planner_defaults.cooldown_minutes),
            target_track_minutes: planner_file
                .target_track_minutes
                .unwrap_or(planner_defaults.target_track_minutes),
            min_phase_minutes: planner_file
                .min_phase_minutes
                .unwrap_or(planner_defaults.min_phase_minutes),
        };
        for (name, value) in [
            ("planner.warmup_minutes", planner.warmup_minutes),
            ("planner.cooldown_minutes", planner.cooldown_minutes),
            ("planner.target_track_minutes", planner.target_track_minutes),
            ("planner.min_phase_minutes", planner.min_phase_minutes),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("{} must be a positive number, got {}", name, value);
            }
        }

        let ranking_file = file.ranking.unwrap_or_default();
        let ranking_defaults = RankingSettings::default();
        let ranking = RankingSettings {
            match_weight: ranking_file
                .match_weight
                .unwrap_or(ranking_defaults.match_weight),
            agnostic_weight: ranking_file
                .agnostic_weight
                .unwrap_or(ranking_defaults.agnostic_weight),
            mismatch_weight: ranking_file
                .mismatch_weight
                .unwrap_or(ranking_defaults.mismatch_weight),
            preferred_artist_boost: ranking_file
                .preferred_artist_boost
                .unwrap_or(ranking_defaults.preferred_artist_boost),
            preferred_genre_boost: ranking_file
                .preferred_genre_boost
                .unwrap_or(ranking_defaults.preferred_genre_boost),
            theme_match_boost: ranking_file
                .theme_match_boost
                .unwrap_or(ranking_defaults.theme_match_boost),
        };
        if !(ranking.match_weight >= ranking.agnostic_weight
            && ranking.agnostic_weight >= ranking.mismatch_weight
            && ranking.mismatch_weight >= 0.0)
        {
            bail!(
                "ranking weights must satisfy match >= agnostic >= mismatch >= 0, got {} / {} / {}",
                ranking.match_weight,
                ranking.agnostic_weight,
                ranking.mismatch_weight
            );
        }

        let selection_file = file.selection.unwrap_or_default();
        let selection_defaults = SelectionSettings::default();
        let selection = SelectionSettings {
            duration_tolerance_minutes: selection_file
                .duration_tolerance_minutes
                .unwrap_or(selection_defaults.duration_tolerance_minutes),
            candidate_limit: selection_file
                .candidate_limit
                .unwrap_or(selection_defaults.candidate_limit),
            debug_candidates: selection_file
                .debug_candidates
                .unwrap_or(selection_defaults.debug_candidates),
        };
        if !(selection.duration_tolerance_minutes >= 0.0) {
            bail!("selection.duration_tolerance_minutes must not be negative");
        }
        if selection.candidate_limit == 0 {
            bail!("selection.candidate_limit must be at least 1");
        }

        let request_file = file.request.unwrap_or_default();
        let request_defaults = RequestSettings::default();
        let default_difficulty = match request_file.default_difficulty {
            Some(label) => match Difficulty::parse(&label) {
                Some(d) => d,
                None => bail!("request.default_difficulty is not a difficulty: {}", label),
            },
            None => request_defaults.default_difficulty,
        };
        let request = RequestSettings {
            max_duration_minutes: request_file
                .max_duration_minutes
                .unwrap_or(request_defaults.max_duration_minutes),
            default_difficulty,
            audiences: request_file
                .audiences
                .unwrap_or(request_defaults.audiences),
        };
        if !request.max_duration_minutes.is_finite() || request.max_duration_minutes <= 0.0 {
            bail!("request.max_duration_minutes must be a positive number");
        }

        let gap_fill_file = file.gap_fill.unwrap_or_default();
        let gap_fill_defaults = GapFillSettings::default();
        let gap_fill = GapFillSettings {
            base_url: gap_fill_file
                .base_url
                .or_else(|| cli.llm_base_url.clone())
                .unwrap_or(gap_fill_defaults.base_url),
            model: gap_fill_file
                .model
                .or_else(|| cli.llm_model.clone())
                .unwrap_or(gap_fill_defaults.model),
            api_key_env: gap_fill_file
                .api_key_env
                .unwrap_or(gap_fill_defaults.api_key_env),
            timeout_secs: gap_fill_file
                .timeout_secs
                .or(cli.gap_fill_timeout_secs)
                .unwrap_or(gap_fill_defaults.timeout_secs),
            max_retries: gap_fill_file
                .max_retries
                .unwrap_or(gap_fill_defaults.max_retries),
            temperature: gap_fill_file
                .temperature
                .unwrap_or(gap_fill_defaults.temperature),
            max_suggestions: gap_fill_file
                .max_suggestions
                .unwrap_or(gap_fill_defaults.max_suggestions),
        };
        if gap_fill.timeout_secs == 0 {
            bail!("gap_fill.timeout_secs must be at least 1");
        }
        if gap_fill.max_suggestions == 0 {
            bail!("gap_fill.max_suggestions must be at least 1");
        }

        Ok(Self {
            catalog_db,
            read_pool_size,
            engine: EngineSettings {
                planner,
                ranking,
                selection,
                request,
                hybrid_by_default: file.hybrid.unwrap_or(cli.hybrid),
            },
            gap_fill,
        })
    }
}

/// Everything the assembler needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub planner: PlannerSettings,
    pub ranking: RankingSettings,
    pub selection: SelectionSettings,
    pub request: RequestSettings,
    /// Hybrid mode for requests that do not say.
    pub hybrid_by_default: bool,
}

#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub warmup_minutes: f64,
    pub cooldown_minutes: f64,
    pub target_track_minutes: f64,
    pub min_phase_minutes: f64,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            warmup_minutes: 5.0,
            cooldown_minutes: 5.0,
            target_track_minutes: 4.0,
            min_phase_minutes: 1.0,
        }
    }
}

/// Feedback weighting and ranking boosts.
#[derive(Debug, Clone)]
pub struct RankingSettings {
    /// Weight of a feedback row whose label matches the request.
    pub match_weight: f64,
    /// Weight of a feedback row with no label.
    pub agnostic_weight: f64,
    /// Weight of a feedback row labelled for something else.
    pub mismatch_weight: f64,
    pub preferred_artist_boost: f64,
    pub preferred_genre_boost: f64,
    pub theme_match_boost: f64,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            match_weight: 1.0,
            agnostic_weight: 0.5,
            mismatch_weight: 0.25,
            preferred_artist_boost: 0.5,
            preferred_genre_boost: 0.3,
            theme_match_boost: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SelectionSettings {
    pub duration_tolerance_minutes: f64,
    /// Catalog rows fetched per filter tier.
    pub candidate_limit: usize,
    /// Top candidates recorded per slot in debug diagnostics.
    pub debug_candidates: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            duration_tolerance_minutes: 1.5,
            candidate_limit: 100,
            debug_candidates: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub max_duration_minutes: f64,
    pub default_difficulty: Difficulty,
    pub audiences: Vec<String>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            max_duration_minutes: 240.0,
            default_difficulty: Difficulty::Intermediate,
            audiences: ["mixed", "spin-mixed", "spin-advanced", "spin-beginner", "50+", "young"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GapFillSettings {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt, transient failures only.
    pub max_retries: u32,
    pub temperature: f32,
    pub max_suggestions: usize,
}

impl GapFillSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GapFillSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 45,
            max_retries: 1,
            temperature: 0.3,
            max_suggestions: 3,
        }
    }
}
