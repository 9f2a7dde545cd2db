//! Query builder for stored records.
//!
//! # Example
//!
//! ```
//! use evinfo_store::{RecordQuery, Store};
//! use time::{Duration, OffsetDateTime};
//!
//! let store = Store::open_in_memory()?;
//! let an_hour_ago = OffsetDateTime::now_utc() - Duration::hours(1);
//!
//! let query = RecordQuery::new()
//!     .since(an_hour_ago)
//!     .unsynced()
//!     .oldest_first()
//!     .limit(50);
//!
//! let records = store.query_records(&query)?;
//! # Ok::<(), evinfo_store::Error>(())
//! ```

use time::OffsetDateTime;

/// Columns in [`TelemetryRecord`](evinfo_types::TelemetryRecord) field order.
pub(crate) const RECORD_COLUMNS: &str = "id, timestamp, soc, soc_hd, speed_mph, current_a, \
     voltage_v, odometer_mi, ambient_temp_f, battery_avg_temp_c, battery_max_temp_c, \
     battery_min_temp_c, battery_coolant_temp_c, hvac_measured_power_w, \
     hvac_commanded_power_w, ac_compressor_on, battery_capacity_ah, \
     battery_resistance_mohm, synced";

/// Fluent query builder for telemetry records.
///
/// By default, queries return every record ordered by timestamp descending
/// (newest first).
#[derive(Debug, Default, Clone)]
pub struct RecordQuery {
    /// Filter records at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Filter records at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Only records not yet marked synced.
    pub unsynced_only: bool,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
    /// Order by timestamp descending (newest first).
    pub newest_first: bool,
}

impl RecordQuery {
    /// Create a new query: all records, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Filter to records at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to records at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Only include records that have not been synced.
    pub fn unsynced(mut self) -> Self {
        self.unsynced_only = true;
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first N results.
    ///
    /// SQLite only accepts `OFFSET` after `LIMIT`, so an offset without a
    /// limit is applied with an unbounded limit.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Order results oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(unix_millis(since)));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp <= ?");
            params.push(Box::new(unix_millis(until)));
        }

        if self.unsynced_only {
            conditions.push("synced = 0");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT {RECORD_COLUMNS} FROM records {where_clause} ORDER BY timestamp {order}, rowid {order}"
        );

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        sql
    }
}

/// Timestamp as stored: milliseconds since the Unix epoch.
pub(crate) fn unix_millis(time: OffsetDateTime) -> i64 {
    (time.unix_timestamp_nanos() / 1_000_000) as i64
}
