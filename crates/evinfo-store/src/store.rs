//! Main store implementation.

use std::io::Write;
use std::path::Path;

use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use evinfo_types::TelemetryRecord;

use crate::error::{Error, Result};
use crate::queries::{RECORD_COLUMNS, RecordQuery, unix_millis};
use crate::schema;

/// SQLite-based store for telemetry records.
pub struct Store {
    conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

// Record operations
impl Store {
    /// Insert a flushed record.
    ///
    /// Returns `false` if a record with the same id is already stored.
    /// Records without any telemetry are rejected.
    pub fn insert_record(&self, record: &TelemetryRecord) -> Result<bool> {
        if record.is_empty() {
            return Err(Error::InvalidRecord(format!(
                "record {} has no telemetry",
                record.id
            )));
        }

        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO records ({RECORD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                         ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
            ),
            rusqlite::params![
                record.id.to_string(),
                unix_millis(record.timestamp),
                record.soc,
                record.soc_hd,
                record.speed_mph,
                record.current_a,
                record.voltage_v,
                record.odometer_mi,
                record.ambient_temp_f,
                record.battery_avg_temp_c,
                record.battery_max_temp_c,
                record.battery_min_temp_c,
                record.battery_coolant_temp_c,
                record.hvac_measured_power_w,
                record.hvac_commanded_power_w,
                record.ac_compressor_on,
                record.battery_capacity_ah,
                record.battery_resistance_mohm,
                record.synced,
            ],
        )?;

        if inserted == 0 {
            debug!("Record {} already stored", record.id);
        }
        Ok(inserted > 0)
    }

    /// Query records with filters.
    pub fn query_records(&self, query: &RecordQuery) -> Result<Vec<TelemetryRecord>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_ref.as_slice(), record_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Oldest records that still need syncing.
    pub fn unsynced_records(&self, limit: u32) -> Result<Vec<TelemetryRecord>> {
        let query = RecordQuery::new().unsynced().oldest_first().limit(limit);
        self.query_records(&query)
    }

    /// Count all records.
    pub fn count_records(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Count records not yet synced.
    pub fn count_unsynced(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

// Sync operations
impl Store {
    /// Mark records as synced. Returns how many rows changed.
    pub fn mark_synced(&self, ids: &[Uuid]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE records SET synced = 1 WHERE id = ? AND synced = 0")?;
            for id in ids {
                updated += stmt.execute([id.to_string()])?;
            }
        }
        tx.commit()?;

        debug!("Marked {updated} of {} records synced", ids.len());
        Ok(updated)
    }

    /// Delete synced records older than `cutoff`. Unsynced records are kept.
    pub fn delete_synced_before(&self, cutoff: OffsetDateTime) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM records WHERE synced = 1 AND timestamp < ?",
            [unix_millis(cutoff)],
        )?;

        info!("Deleted {deleted} synced records before {cutoff}");
        Ok(deleted)
    }
}

// Export operations
impl Store {
    /// Write matching records as CSV, header first. Returns the row count.
    ///
    /// Nothing is written when no record matches.
    pub fn export_csv<W: Write>(&self, query: &RecordQuery, writer: W) -> Result<usize> {
        let records = self.query_records(query)?;
        let mut csv = csv::Writer::from_writer(writer);
        for record in &records {
            csv.serialize(record)?;
        }
        csv.flush()?;

        info!("Exported {} records", records.len());
        Ok(records.len())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<TelemetryRecord> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    let millis: i64 = row.get(1)?;
    let timestamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e)))?;

    Ok(TelemetryRecord {
        id,
        timestamp,
        soc: row.get(2)?,
        soc_hd: row.get(3)?,
        speed_mph: row.get(4)?,
        current_a: row.get(5)?,
        voltage_v: row.get(6)?,
        odometer_mi: row.get(7)?,
        ambient_temp_f: row.get(8)?,
        battery_avg_temp_c: row.get(9)?,
        battery_max_temp_c: row.get(10)?,
        battery_min_temp_c: row.get(11)?,
        battery_coolant_temp_c: row.get(12)?,
        hvac_measured_power_w: row.get(13)?,
        hvac_commanded_power_w: row.get(14)?,
        ac_compressor_on: row.get(15)?,
        battery_capacity_ah: row.get(16)?,
        battery_resistance_mohm: row.get(17)?,
        synced: row.get(18)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    fn record_at(timestamp: OffsetDateTime, soc: f64) -> TelemetryRecord {
        let mut record = TelemetryRecord::new(timestamp);
        record.soc = Some(soc);
        record.voltage_v = Some(352.5);
        record.current_a = Some(-12.0);
        record.ac_compressor_on = Some(true);
        record
    }

    fn base() -> OffsetDateTime {
        datetime!(2024-03-01 08:00:00 UTC)
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert_eq!(store.count_unsynced().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_query_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let record = record_at(base() + Duration::milliseconds(250), 81.5);

        assert!(store.insert_record(&record).unwrap());

        let stored = store.query_records(&RecordQuery::new()).unwrap();
        assert_eq!(stored, [record]);
    }

    #[test]
    fn test_duplicate_id_ignored() {
        let store = Store::open_in_memory().unwrap();
        let record = record_at(base(), 80.0);

        assert!(store.insert_record(&record).unwrap());
        assert!(!store.insert_record(&record).unwrap());
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn test_empty_record_rejected() {
        let store = Store::open_in_memory().unwrap();
        let result = store.insert_record(&TelemetryRecord::new(base()));
        assert!(matches!(result, Err(Error::InvalidRecord(_))));
    }

    #[test]
    fn test_query_order_and_time_range() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .insert_record(&record_at(base() + Duration::minutes(i), i as f64))
                .unwrap();
        }

        let newest = store.query_records(&RecordQuery::new().limit(2)).unwrap();
        assert_eq!(newest[0].soc, Some(4.0));
        assert_eq!(newest[1].soc, Some(3.0));

        let range = RecordQuery::new()
            .since(base() + Duration::minutes(1))
            .until(base() + Duration::minutes(3))
            .oldest_first();
        let socs: Vec<_> = store
            .query_records(&range)
            .unwrap()
            .into_iter()
            .map(|r| r.soc)
            .collect();
        assert_eq!(socs, [Some(1.0), Some(2.0), Some(3.0)]);

        let page = RecordQuery::new().oldest_first().offset(3);
        assert_eq!(store.query_records(&page).unwrap().len(), 2);
    }

    #[test]
    fn test_sync_tracking() {
        let store = Store::open_in_memory().unwrap();
        let records: Vec<_> = (0..4)
            .map(|i| record_at(base() + Duration::seconds(i), 50.0))
            .collect();
        for record in &records {
            store.insert_record(record).unwrap();
        }

        let pending = store.unsynced_records(2).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, records[0].id);
        assert_eq!(pending[1].id, records[1].id);

        let ids: Vec<_> = pending.iter().map(|r| r.id).collect();
        assert_eq!(store.mark_synced(&ids).unwrap(), 2);
        // Already synced
        assert_eq!(store.mark_synced(&ids).unwrap(), 0);
        assert_eq!(store.mark_synced(&[Uuid::new_v4()]).unwrap(), 0);

        assert_eq!(store.count_records().unwrap(), 4);
        assert_eq!(store.count_unsynced().unwrap(), 2);
        let remaining = store.unsynced_records(10).unwrap();
        assert_eq!(remaining[0].id, records[2].id);
        assert!(remaining.iter().all(|r| !r.synced));
    }

    #[test]
    fn test_delete_synced_before_keeps_unsynced() {
        let store = Store::open_in_memory().unwrap();
        let old_synced = record_at(base(), 1.0);
        let old_unsynced = record_at(base() + Duration::seconds(1), 2.0);
        let new_synced = record_at(base() + Duration::hours(2), 3.0);
        for record in [&old_synced, &old_unsynced, &new_synced] {
            store.insert_record(record).unwrap();
        }
        store.mark_synced(&[old_synced.id, new_synced.id]).unwrap();

        let deleted = store
            .delete_synced_before(base() + Duration::hours(1))
            .unwrap();
        assert_eq!(deleted, 1);

        let ids: Vec<_> = store
            .query_records(&RecordQuery::new().oldest_first())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, [old_unsynced.id, new_synced.id]);
    }

    #[test]
    fn test_export_csv() {
        let store = Store::open_in_memory().unwrap();
        let record = record_at(base(), 75.0);
        store.insert_record(&record).unwrap();

        let mut out = Vec::new();
        let rows = store.export_csv(&RecordQuery::new(), &mut out).unwrap();
        assert_eq!(rows, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,timestamp,soc,soc_hd,speed_mph,"));
        assert!(header.ends_with(",synced"));

        let row = lines.next().unwrap();
        assert!(row.starts_with(&format!("{},2024-03-01T08:00:00Z,75.0,,", record.id)));
        assert!(row.ends_with(",false"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_csv_empty() {
        let store = Store::open_in_memory().unwrap();
        let mut out = Vec::new();
        assert_eq!(store.export_csv(&RecordQuery::new(), &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
