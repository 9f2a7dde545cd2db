//! Database schema.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema.
///
/// Creates the tables on a fresh database; an existing one is left as is.
pub fn initialize(conn: &Connection) -> Result<()> {
    if get_schema_version(conn)? == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 =
        conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))?;

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?)",
        [version],
    )?;
    Ok(())
}

fn create_schema_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        -- One row per flush window; timestamp is unix milliseconds
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            timestamp INTEGER NOT NULL,
            soc REAL,
            soc_hd REAL,
            speed_mph REAL,
            current_a REAL,
            voltage_v REAL,
            odometer_mi REAL,
            ambient_temp_f REAL,
            battery_avg_temp_c REAL,
            battery_max_temp_c REAL,
            battery_min_temp_c REAL,
            battery_coolant_temp_c REAL,
            hvac_measured_power_w REAL,
            hvac_commanded_power_w REAL,
            ac_compressor_on INTEGER,
            battery_capacity_ah REAL,
            battery_resistance_mohm REAL,
            synced INTEGER NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS idx_records_timestamp
            ON records(timestamp);
        CREATE INDEX IF NOT EXISTS idx_records_synced
            ON records(synced, timestamp);
        "#,
    )?;

    Ok(())
}
