//! Export command implementation.

use std::fs::File;
use std::io::{self, BufWriter};

use anyhow::{Context, Result};

use evinfo_store::{RecordQuery, Store};

use super::resolve_db_path;
use crate::cli::ExportArgs;
use crate::config::Config;

pub fn cmd_export(args: &ExportArgs, config: &Config, quiet: bool) -> Result<()> {
    let db_path = resolve_db_path(&args.db, config);
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let query = export_query(args);

    let rows = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            store.export_csv(&query, BufWriter::new(file))?
        }
        None => store.export_csv(&query, io::stdout().lock())?,
    };

    if !quiet {
        eprintln!("Exported {rows} records");
    }
    Ok(())
}

/// Chronological query honoring the export filters.
fn export_query(args: &ExportArgs) -> RecordQuery {
    let mut query = RecordQuery::new().oldest_first();
    if args.unsynced {
        query = query.unsynced();
    }
    if let Some(since) = args.since {
        query = query.since(since);
    }
    query
}
