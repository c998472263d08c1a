use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use choreography_server::bootstrap::{build_assembler, init_tracing, load_config, parse_path};
use choreography_server::config::CliConfig;
use choreography_server::mcp::{McpRegistry, McpServer, ToolContext};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite catalog database file. Can also be specified in config file.
    #[clap(value_parser = parse_path)]
    pub catalog_db: Option<PathBuf>,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Fill slots the catalog cannot serve with suggestions, unless a request says otherwise.
    #[clap(long)]
    pub hybrid: bool,

    /// Base URL of the OpenAI-compatible completion API.
    #[clap(long)]
    pub llm_base_url: Option<String>,

    /// Model used for gap-fill suggestions.
    #[clap(long)]
    pub llm_model: Option<String>,

    /// Timeout in seconds for one gap-fill request.
    #[clap(long)]
    pub gap_fill_timeout_secs: Option<u64>,

    /// Number of read connections to the catalog database.
    #[clap(long, default_value_t = 4)]
    pub read_pool_size: usize,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            catalog_db: args.catalog_db.clone(),
            read_pool_size: args.read_pool_size,
            hybrid: args.hybrid,
            llm_base_url: args.llm_base_url.clone(),
            llm_model: args.llm_model.clone(),
            gap_fill_timeout_secs: args.gap_fill_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    init_tracing()?;

    let config = load_config(&(&cli_args).into(), cli_args.config.as_deref())?;
    let assembler = Arc::new(build_assembler(&config)?);

    let mut server = McpServer::new(
        Arc::new(McpRegistry::with_defaults()),
        ToolContext::new(assembler),
    );

    info!("Serving MCP on stdio");
    server
        .serve(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await?;
    info!("Stdin closed, shutting down");
    Ok(())
}
