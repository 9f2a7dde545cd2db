//! Platform-agnostic types for EV OBD-II telemetry.
//!
//! This crate provides the shared vocabulary used by the poller
//! (evinfo-core), the record store (evinfo-store) and the CLI.
//!
//! # Features
//!
//! - Decoded telemetry values with units
//! - Flat telemetry records for persistence and CSV export
//! - Adapter directive and request constants
//! - Error types for response payload parsing
//!
//! # Example
//!
//! ```
//! use evinfo_types::{TelemetryRecord, TelemetryValue};
//!
//! let mut record = TelemetryRecord::now();
//! record.apply(&TelemetryValue::PackVoltage(165.0));
//! assert_eq!(record.voltage_v, Some(165.0));
//! ```

pub mod error;
pub mod pid;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{TelemetryRecord, TelemetryValue, hex_bytes};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    // --- TelemetryRecord tests ---

    #[test]
    fn test_new_record_is_empty() {
        let record = TelemetryRecord::new(datetime!(2024-05-01 12:00 UTC));

        assert!(record.is_empty());
        assert_eq!(record.populated_fields(), 0);
        assert!(!record.synced);
    }

    #[test]
    fn test_apply_sets_matching_field() {
        let mut record = TelemetryRecord::now();
        record.apply(&TelemetryValue::BatteryCurrent(-10.0));
        record.apply(&TelemetryValue::AcCompressor(false));

        assert_eq!(record.current_a, Some(-10.0));
        assert_eq!(record.ac_compressor_on, Some(false));
        assert_eq!(record.populated_fields(), 2);
        assert!(!record.is_empty());
    }

    #[test]
    fn test_apply_overwrites_earlier_value() {
        let mut record = TelemetryRecord::now();
        record.apply(&TelemetryValue::Speed(10.0));
        record.apply(&TelemetryValue::Speed(12.5));

        assert_eq!(record.speed_mph, Some(12.5));
        assert_eq!(record.populated_fields(), 1);
    }

    #[test]
    fn test_apply_covers_every_field() {
        let values = [
            TelemetryValue::Speed(1.0),
            TelemetryValue::Odometer(2.0),
            TelemetryValue::BatteryCurrent(3.0),
            TelemetryValue::PackVoltage(4.0),
            TelemetryValue::StateOfCharge(5.0),
            TelemetryValue::StateOfChargeHd(6.0),
            TelemetryValue::AmbientTemperature(7.0),
            TelemetryValue::BatteryAvgTemperature(8.0),
            TelemetryValue::BatteryMaxTemperature(9.0),
            TelemetryValue::BatteryMinTemperature(10.0),
            TelemetryValue::BatteryCoolantTemperature(11.0),
            TelemetryValue::HvacMeasuredPower(12.0),
            TelemetryValue::HvacCommandedPower(13.0),
            TelemetryValue::AcCompressor(true),
            TelemetryValue::BatteryCapacity(14.0),
            TelemetryValue::BatteryResistance(15.0),
        ];
        let mut record = TelemetryRecord::now();
        for value in &values {
            record.apply(value);
        }

        assert_eq!(record.populated_fields(), values.len());
    }

    #[test]
    fn test_records_get_distinct_ids() {
        let a = TelemetryRecord::now();
        let b = TelemetryRecord::now();
        assert_ne!(a.id, b.id);
    }

    // --- TelemetryValue tests ---

    #[test]
    fn test_value_display_includes_units() {
        assert_eq!(TelemetryValue::PackVoltage(165.0).to_string(), "voltage 165.0 V");
        assert_eq!(TelemetryValue::BatteryCurrent(-10.0).to_string(), "current -10.00 A");
        assert_eq!(TelemetryValue::AcCompressor(true).to_string(), "A/C compressor on");
    }

    #[test]
    fn test_value_name_matches_record_field() {
        assert_eq!(TelemetryValue::Speed(0.0).name(), "speed_mph");
        assert_eq!(TelemetryValue::BatteryResistance(0.0).name(), "battery_resistance_mohm");
    }

    // --- hex_bytes tests ---

    #[test]
    fn test_hex_bytes_parses_groups() {
        assert_eq!(hex_bytes("014A", 2).unwrap(), vec![0x01, 0x4A]);
        assert_eq!(hex_bytes("ff", 1).unwrap(), vec![0xFF]);
    }

    #[test]
    fn test_hex_bytes_ignores_trailing_data() {
        assert_eq!(hex_bytes("28AABB>", 1).unwrap(), vec![0x28]);
    }

    #[test]
    fn test_hex_bytes_insufficient_data() {
        let err = hex_bytes("0", 1).unwrap_err();
        assert_eq!(
            err,
            ParseError::InsufficientData {
                expected: 1,
                actual: 0
            }
        );
        assert!(err.to_string().contains("expected 1 bytes"));
    }

    #[test]
    fn test_hex_bytes_rejects_non_hex() {
        assert!(matches!(hex_bytes("ZZ", 1), Err(ParseError::InvalidHex(_))));
        assert!(matches!(hex_bytes("+F", 1), Err(ParseError::InvalidHex(_))));
    }

    // --- Serialization tests ---

    #[cfg(feature = "serde")]
    #[test]
    fn test_value_serializes_tagged() {
        let json = serde_json::to_string(&TelemetryValue::PackVoltage(165.0)).unwrap();
        assert_eq!(json, r#"{"kind":"pack_voltage","value":165.0}"#);

        let back: TelemetryValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TelemetryValue::PackVoltage(165.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_record_serializes_rfc3339_timestamp() {
        let mut record = TelemetryRecord::new(datetime!(2024-05-01 12:30:00 UTC));
        record.apply(&TelemetryValue::StateOfCharge(80.0));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["timestamp"], "2024-05-01T12:30:00Z");
        assert_eq!(json["soc"], 80.0);
        assert!(json["speed_mph"].is_null());
        assert_eq!(json["synced"], false);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_record_synced_defaults_when_missing() {
        let json = r#"{
            "id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "timestamp": "2024-05-01T12:30:00Z",
            "soc": null, "soc_hd": null, "speed_mph": 20.0, "current_a": null,
            "voltage_v": null, "odometer_mi": null, "ambient_temp_f": null,
            "battery_avg_temp_c": null, "battery_max_temp_c": null,
            "battery_min_temp_c": null, "battery_coolant_temp_c": null,
            "hvac_measured_power_w": null, "hvac_commanded_power_w": null,
            "ac_compressor_on": null, "battery_capacity_ah": null,
            "battery_resistance_mohm": null
        }"#;
        let record: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert!(!record.synced);
        assert_eq!(record.speed_mph, Some(20.0));
    }
}
