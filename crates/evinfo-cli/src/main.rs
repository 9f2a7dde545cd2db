//! Command-line telemetry logger for electric vehicles.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `run` | Poll the vehicle and record telemetry |
//! | `export` | Export stored records as CSV |
//! | `status` | Show stored record counts |
//!
//! Settings are read from `config.toml` in the platform config directory
//! unless `--config` points elsewhere.

mod cli;
mod commands;
mod config;
mod format;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_validated(path)?,
        None => {
            let config = Config::load_default()?;
            config.validate()?;
            config
        }
    };

    match cli.command {
        Commands::Run(args) => commands::cmd_run(args, &config, cli.quiet).await,
        Commands::Export(args) => commands::cmd_export(&args, &config, cli.quiet),
        Commands::Status(args) => commands::cmd_status(&args, &config),
    }
}
