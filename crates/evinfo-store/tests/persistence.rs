//! File-backed store tests.

use evinfo_store::{RecordQuery, Store};
use evinfo_types::{TelemetryRecord, TelemetryValue};
use time::macros::datetime;

fn sample() -> TelemetryRecord {
    let mut record = TelemetryRecord::new(datetime!(2024-06-10 17:45:12.125 UTC));
    record.apply(&TelemetryValue::StateOfCharge(64.5));
    record.apply(&TelemetryValue::Odometer(18_250.4));
    record.apply(&TelemetryValue::AcCompressor(false));
    record
}

#[test]
fn test_open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("telemetry.db");

    let store = Store::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.count_records().unwrap(), 0);
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry.db");
    let record = sample();

    {
        let store = Store::open(&path).unwrap();
        store.insert_record(&record).unwrap();
        store.mark_synced(&[record.id]).unwrap();
    }

    let store = Store::open(&path).unwrap();
    let stored = store.query_records(&RecordQuery::new()).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, record.id);
    assert_eq!(stored[0].timestamp, record.timestamp);
    assert_eq!(stored[0].soc, Some(64.5));
    assert_eq!(stored[0].ac_compressor_on, Some(false));
    assert!(stored[0].synced);
    assert_eq!(store.count_unsynced().unwrap(), 0);
}

#[test]
fn test_export_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("telemetry.db")).unwrap();
    store.insert_record(&sample()).unwrap();

    let out_path = dir.path().join("export.csv");
    let file = std::fs::File::create(&out_path).unwrap();
    let rows = store
        .export_csv(&RecordQuery::new().unsynced(), file)
        .unwrap();
    assert_eq!(rows, 1);

    let text = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(text.lines().count(), 2);
    assert!(text.contains("2024-06-10T17:45:12.125Z"));
}
