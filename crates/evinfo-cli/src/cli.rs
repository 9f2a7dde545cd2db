//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "evinfo")]
#[command(author, version, about = "Telemetry logger for EVs with an ELM327 adapter", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Poll the vehicle and record telemetry
    Run(RunArgs),

    /// Export stored records as CSV
    Export(ExportArgs),

    /// Show stored record counts
    Status(StatusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Adapter address as host:port (overrides config)
    #[arg(short, long, conflicts_with = "mock")]
    pub address: Option<String>,

    /// Use the simulated adapter instead of a real one
    #[arg(long)]
    pub mock: bool,

    #[command(flatten)]
    pub db: DbArgs,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Milliseconds between polling requests (overrides config)
    #[arg(short, long)]
    pub poll_interval: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Write CSV to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Only export records that have not been synced
    #[arg(long)]
    pub unsynced: bool,

    /// Only export records at or after this RFC 3339 timestamp
    #[arg(long, value_parser = parse_rfc3339)]
    pub since: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Reusable database location argument
#[derive(Debug, Clone, Args)]
pub struct DbArgs {
    /// Database file (overrides config)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

fn parse_rfc3339(s: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(s, &Rfc3339).map_err(|e| format!("invalid RFC 3339 timestamp: {e}"))
}
