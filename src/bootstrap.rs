//! Process wiring shared by the binaries: logging, configuration, the
//! assembler with its collaborators, and the one-shot build command.

use crate::assembler::PlaylistAssembler;
use crate::catalog_store::SqliteCatalogStore;
use crate::config::{AppConfig, CliConfig, FileConfig};
use crate::gap_fill::LlmGapFiller;
use crate::llm::{ApiKeySource, OpenAIProvider};
use crate::request::PlaylistRequest;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// protocol frames and command output.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to install tracing subscriber")
}

/// Resolve a CLI path against the working directory.
pub fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

/// Load the optional TOML file and resolve it over the CLI values.
pub fn load_config(cli: &CliConfig, config_path: Option<&Path>) -> Result<AppConfig> {
    let file_config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(cli, file_config)?;

    info!("Configuration loaded:");
    info!("  catalog_db: {:?}", config.catalog_db);
    info!("  read_pool_size: {}", config.read_pool_size);
    info!("  hybrid_by_default: {}", config.engine.hybrid_by_default);
    info!(
        "  gap_fill: {} at {} (timeout {}s)",
        config.gap_fill.model, config.gap_fill.base_url, config.gap_fill.timeout_secs
    );
    Ok(config)
}

/// Open the catalog and attach gap-fill when an API key is available.
pub fn build_assembler(config: &AppConfig) -> Result<PlaylistAssembler> {
    info!("Opening SQLite catalog database at {:?}...", config.catalog_db);
    let store = SqliteCatalogStore::new(&config.catalog_db, config.read_pool_size)?;
    let assembler = PlaylistAssembler::new(Arc::new(store), config.engine.clone());

    let key_var = &config.gap_fill.api_key_env;
    let has_key = std::env::var(key_var).is_ok_and(|k| !k.trim().is_empty());
    if !has_key {
        if config.engine.hybrid_by_default {
            warn!(
                "{} is not set, hybrid mode is disabled and routines use the catalog only",
                key_var
            );
        } else {
            info!("{} is not set, gap-fill is unavailable", key_var);
        }
        return Ok(assembler);
    }

    let provider = OpenAIProvider::new(
        config.gap_fill.base_url.clone(),
        config.gap_fill.model.clone(),
        ApiKeySource::Env(key_var.clone()),
    );
    info!("Gap-fill enabled with model {}", config.gap_fill.model);
    Ok(assembler.with_gap_filler(Arc::new(LlmGapFiller::new(
        Arc::new(provider),
        config.gap_fill.clone(),
    ))))
}

/// Parse a playlist request from a JSON file, or from stdin when `source`
/// is absent or `-`.
pub fn read_request(source: Option<&str>) -> Result<PlaylistRequest> {
    let raw = match source {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path))?,
    };
    serde_json::from_str(&raw).context("Request is not a valid playlist request")
}

/// Build one routine and render it as JSON.
pub async fn render_routine(
    assembler: &PlaylistAssembler,
    request: &PlaylistRequest,
    compact: bool,
) -> Result<String> {
    let routine = assembler.build(request).await?;
    info!(
        tracks = routine.entries.len(),
        unfilled = routine.unfilled_slots.len(),
        "Routine built"
    );
    let output = if compact {
        serde_json::to_string(&routine)?
    } else {
        serde_json::to_string_pretty(&routine)?
    };
    Ok(output)
}
