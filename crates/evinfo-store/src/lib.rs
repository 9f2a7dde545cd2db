//! Local persistence for EV telemetry records.
//!
//! Records flushed by a polling session are kept in SQLite until they have
//! been synced elsewhere, and can be queried or exported as CSV.
//!
//! # Features
//!
//! - One row per flushed [`TelemetryRecord`](evinfo_types::TelemetryRecord)
//! - Sync tracking: list unsynced records, mark them synced, prune old ones
//! - Query by time range with pagination
//! - CSV export
//!
//! # Example
//!
//! ```no_run
//! use evinfo_store::{RecordQuery, Store};
//!
//! let store = Store::open_default()?;
//!
//! let query = RecordQuery::new().unsynced().limit(10);
//! for record in store.query_records(&query)? {
//!     println!("{} {:?}", record.timestamp, record.soc);
//! }
//! # Ok::<(), evinfo_store::Error>(())
//! ```

mod error;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use queries::RecordQuery;
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/evinfo/telemetry.db`
/// - macOS: `~/Library/Application Support/evinfo/telemetry.db`
/// - Windows: `C:\Users\<user>\AppData\Local\evinfo\telemetry.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("evinfo")
        .join("telemetry.db")
}
