//! Status command implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use evinfo_store::{RecordQuery, Store};

use super::resolve_db_path;
use crate::cli::{OutputFormat, StatusArgs};
use crate::config::Config;

/// Summary of the local record store.
#[derive(Debug, Clone, PartialEq, Serialize)]
struct StoreStatus {
    path: PathBuf,
    records: u64,
    unsynced: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    latest: Option<OffsetDateTime>,
}

pub fn cmd_status(args: &StatusArgs, config: &Config) -> Result<()> {
    let db_path = resolve_db_path(&args.db, config);
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let status = collect_status(&store, &db_path)?;

    let content = match args.format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => format_status_text(&status),
    };
    print!("{content}");
    Ok(())
}

fn collect_status(store: &Store, path: &Path) -> Result<StoreStatus> {
    let latest = store
        .query_records(&RecordQuery::new().limit(1))?
        .pop()
        .map(|r| r.timestamp);

    Ok(StoreStatus {
        path: path.to_path_buf(),
        records: store.count_records()?,
        unsynced: store.count_unsynced()?,
        latest,
    })
}

fn format_status_text(status: &StoreStatus) -> String {
    let latest = status
        .latest
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "Database: {}\nRecords:  {} ({} unsynced)\nLatest:   {}\n",
        status.path.display(),
        status.records,
        status.unsynced,
        latest
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use evinfo_types::{TelemetryRecord, TelemetryValue};
    use time::macros::datetime;

    #[test]
    fn test_status_of_empty_store() {
        let store = Store::open_in_memory().unwrap();
        let status = collect_status(&store, Path::new("mem.db")).unwrap();
        assert_eq!(status.records, 0);
        assert_eq!(status.latest, None);
        assert_eq!(
            format_status_text(&status),
            "Database: mem.db\nRecords:  0 (0 unsynced)\nLatest:   never\n"
        );
    }

    #[test]
    fn test_status_counts_and_latest() {
        let store = Store::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for hour in [8, 10, 9] {
            let mut record =
                TelemetryRecord::new(datetime!(2024-05-01 00:00:00 UTC) + time::Duration::hours(hour));
            record.apply(&TelemetryValue::Speed(30.0));
            store.insert_record(&record).unwrap();
            ids.push(record.id);
        }
        store.mark_synced(&ids[..1]).unwrap();

        let status = collect_status(&store, Path::new("t.db")).unwrap();
        assert_eq!(status.records, 3);
        assert_eq!(status.unsynced, 2);
        assert_eq!(status.latest, Some(datetime!(2024-05-01 10:00:00 UTC)));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["latest"], "2024-05-01T10:00:00Z");
        assert_eq!(json["unsynced"], 2);
    }
}
