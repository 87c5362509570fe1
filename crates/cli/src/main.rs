//! kvbulk - command-line bulk operations for a remote key-value store.
//!
//! Responsibilities:
//! - Parse command-line arguments and environment variables.
//! - Build the shared API client from config (env, profiles, flags).
//! - Execute orchestrations from `kvbulk-engine` and render their progress.
//!
//! Does NOT handle:
//! - HTTP or orchestration logic (see `crates/client` and `crates/engine`).
//!
//! Invariants / Assumptions:
//! - `.env` is loaded BEFORE clap parsing so env-backed flags pick it up.
//! - Data goes to stdout; progress, warnings and summaries go to stderr.

mod args;
mod cancellation;
mod commands;
mod progress;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use args::Cli;
use commands::CommandContext;
use kvbulk_client::KvClient;
use kvbulk_config::ConfigLoader;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before CLI parsing so clap env defaults can read .env values.
    let loader = ConfigLoader::new().load_dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info,kvbulk_engine=debug,kvbulk_client=debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut loader = loader
        .with_account_id(cli.account_id.clone())
        .with_base_url(cli.base_url.clone());
    if let Some(profile) = &cli.profile {
        loader = loader.with_profile_name(profile.clone());
    }
    if let Some(path) = &cli.config_path {
        loader = loader.with_config_path(path.clone());
    }
    let config = loader.from_env()?.from_profile()?.build()?;

    let client = KvClient::builder().from_config(&config).build()?;
    let cancel = cancellation::install_ctrl_c_handler();

    let exit_code = commands::run(cli.command, CommandContext { client, cancel }).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
