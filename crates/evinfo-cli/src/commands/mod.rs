//! Command implementations for the CLI.

mod export;
mod run;
mod status;

pub use export::cmd_export;
pub use run::cmd_run;
pub use status::cmd_status;

use std::path::PathBuf;

use crate::cli::DbArgs;
use crate::config::Config;

/// Database path from `--db`, falling back to the configured one.
fn resolve_db_path(args: &DbArgs, config: &Config) -> PathBuf {
    args.db
        .clone()
        .unwrap_or_else(|| config.storage.path.clone())
}
