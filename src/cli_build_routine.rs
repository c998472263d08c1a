use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use choreography_server::bootstrap::{
    build_assembler, init_tracing, load_config, parse_path, read_request, render_routine,
};
use choreography_server::config::CliConfig;

/// Build one routine from a request JSON and print it.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite catalog database file.
    #[clap(value_parser = parse_path)]
    pub catalog_db: PathBuf,

    /// Request JSON file. Reads stdin when omitted or "-".
    pub request: Option<String>,

    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Use gap-fill when the request does not say.
    #[clap(long)]
    pub hybrid: bool,

    #[clap(long)]
    pub llm_base_url: Option<String>,

    #[clap(long)]
    pub llm_model: Option<String>,

    #[clap(long)]
    pub gap_fill_timeout_secs: Option<u64>,

    /// Print compact JSON instead of pretty-printed.
    #[clap(long)]
    pub compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    init_tracing()?;

    let cli_config = CliConfig {
        catalog_db: Some(cli_args.catalog_db.clone()),
        read_pool_size: 1,
        hybrid: cli_args.hybrid,
        llm_base_url: cli_args.llm_base_url.clone(),
        llm_model: cli_args.llm_model.clone(),
        gap_fill_timeout_secs: cli_args.gap_fill_timeout_secs,
    };
    let config = load_config(&cli_config, cli_args.config.as_deref())?;
    let assembler = build_assembler(&config)?;

    let request = read_request(cli_args.request.as_deref())?;
    let output = render_routine(&assembler, &request, cli_args.compact).await?;
    println!("{}", output);
    Ok(())
}
