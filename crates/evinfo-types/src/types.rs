//! Core types for EV telemetry data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ParseError, ParseResult};

/// A single decoded physical value reported by the vehicle.
///
/// One variant per quantity the poller knows how to decode. Values are
/// immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value", rename_all = "snake_case"))]
pub enum TelemetryValue {
    /// Vehicle speed in mph.
    Speed(f64),
    /// Odometer reading in miles.
    Odometer(f64),
    /// Battery pack current in amperes. Negative while charging/regenerating.
    BatteryCurrent(f64),
    /// Battery pack voltage in volts.
    PackVoltage(f64),
    /// Displayed state of charge in percent.
    StateOfCharge(f64),
    /// High resolution state of charge in percent.
    StateOfChargeHd(f64),
    /// Ambient air temperature in °F.
    AmbientTemperature(f64),
    /// Battery average temperature in °C.
    BatteryAvgTemperature(f64),
    /// Battery maximum temperature in °C.
    BatteryMaxTemperature(f64),
    /// Battery minimum temperature in °C.
    BatteryMinTemperature(f64),
    /// Battery coolant temperature in °C.
    BatteryCoolantTemperature(f64),
    /// HVAC measured power draw in watts.
    HvacMeasuredPower(f64),
    /// HVAC commanded power in watts.
    HvacCommandedPower(f64),
    /// Whether the A/C compressor is running.
    AcCompressor(bool),
    /// Battery capacity estimate in ampere-hours.
    BatteryCapacity(f64),
    /// Battery internal resistance in milliohms.
    BatteryResistance(f64),
}

impl TelemetryValue {
    /// Short snake_case name of the quantity, matching the record field it fills.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryValue::Speed(_) => "speed_mph",
            TelemetryValue::Odometer(_) => "odometer_mi",
            TelemetryValue::BatteryCurrent(_) => "current_a",
            TelemetryValue::PackVoltage(_) => "voltage_v",
            TelemetryValue::StateOfCharge(_) => "soc",
            TelemetryValue::StateOfChargeHd(_) => "soc_hd",
            TelemetryValue::AmbientTemperature(_) => "ambient_temp_f",
            TelemetryValue::BatteryAvgTemperature(_) => "battery_avg_temp_c",
            TelemetryValue::BatteryMaxTemperature(_) => "battery_max_temp_c",
            TelemetryValue::BatteryMinTemperature(_) => "battery_min_temp_c",
            TelemetryValue::BatteryCoolantTemperature(_) => "battery_coolant_temp_c",
            TelemetryValue::HvacMeasuredPower(_) => "hvac_measured_power_w",
            TelemetryValue::HvacCommandedPower(_) => "hvac_commanded_power_w",
            TelemetryValue::AcCompressor(_) => "ac_compressor_on",
            TelemetryValue::BatteryCapacity(_) => "battery_capacity_ah",
            TelemetryValue::BatteryResistance(_) => "battery_resistance_mohm",
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Speed(v) => write!(f, "speed {v:.1} mph"),
            TelemetryValue::Odometer(v) => write!(f, "odometer {v:.1} mi"),
            TelemetryValue::BatteryCurrent(v) => write!(f, "current {v:.2} A"),
            TelemetryValue::PackVoltage(v) => write!(f, "voltage {v:.1} V"),
            TelemetryValue::StateOfCharge(v) => write!(f, "SoC {v:.1}%"),
            TelemetryValue::StateOfChargeHd(v) => write!(f, "SoC (HD) {v:.2}%"),
            TelemetryValue::AmbientTemperature(v) => write!(f, "ambient {v:.1}°F"),
            TelemetryValue::BatteryAvgTemperature(v) => write!(f, "battery avg {v:.0}°C"),
            TelemetryValue::BatteryMaxTemperature(v) => write!(f, "battery max {v:.0}°C"),
            TelemetryValue::BatteryMinTemperature(v) => write!(f, "battery min {v:.0}°C"),
            TelemetryValue::BatteryCoolantTemperature(v) => write!(f, "coolant {v:.0}°C"),
            TelemetryValue::HvacMeasuredPower(v) => write!(f, "HVAC measured {v:.0} W"),
            TelemetryValue::HvacCommandedPower(v) => write!(f, "HVAC commanded {v:.0} W"),
            TelemetryValue::AcCompressor(on) => {
                write!(f, "A/C compressor {}", if *on { "on" } else { "off" })
            }
            TelemetryValue::BatteryCapacity(v) => write!(f, "capacity {v:.2} Ah"),
            TelemetryValue::BatteryResistance(v) => write!(f, "resistance {v:.1} mΩ"),
        }
    }
}

/// A batch of telemetry accumulated over one flush window.
///
/// Every field except the identity, timestamp and sync flag is optional: a
/// field is only set when a matching value was decoded during the window.
/// The flat layout doubles as a CSV row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelemetryRecord {
    /// Unique record identifier.
    pub id: Uuid,
    /// When the accumulation window opened.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Displayed state of charge (%).
    pub soc: Option<f64>,
    /// High resolution state of charge (%).
    pub soc_hd: Option<f64>,
    /// Speed (mph).
    pub speed_mph: Option<f64>,
    /// Battery current (A).
    pub current_a: Option<f64>,
    /// Pack voltage (V).
    pub voltage_v: Option<f64>,
    /// Odometer (mi).
    pub odometer_mi: Option<f64>,
    /// Ambient temperature (°F).
    pub ambient_temp_f: Option<f64>,
    pub battery_avg_temp_c: Option<f64>,
    pub battery_max_temp_c: Option<f64>,
    pub battery_min_temp_c: Option<f64>,
    pub battery_coolant_temp_c: Option<f64>,
    pub hvac_measured_power_w: Option<f64>,
    pub hvac_commanded_power_w: Option<f64>,
    pub ac_compressor_on: Option<bool>,
    pub battery_capacity_ah: Option<f64>,
    pub battery_resistance_mohm: Option<f64>,
    /// Whether the record has been uploaded upstream.
    #[cfg_attr(feature = "serde", serde(default))]
    pub synced: bool,
}

impl TelemetryRecord {
    /// Create an empty record stamped with the given time.
    #[must_use]
    pub fn new(timestamp: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            soc: None,
            soc_hd: None,
            speed_mph: None,
            current_a: None,
            voltage_v: None,
            odometer_mi: None,
            ambient_temp_f: None,
            battery_avg_temp_c: None,
            battery_max_temp_c: None,
            battery_min_temp_c: None,
            battery_coolant_temp_c: None,
            hvac_measured_power_w: None,
            hvac_commanded_power_w: None,
            ac_compressor_on: None,
            battery_capacity_ah: None,
            battery_resistance_mohm: None,
            synced: false,
        }
    }

    /// Create an empty record stamped with the current UTC time.
    #[must_use]
    pub fn now() -> Self {
        Self::new(OffsetDateTime::now_utc())
    }

    /// Store a decoded value in its field, replacing any earlier value.
    pub fn apply(&mut self, value: &TelemetryValue) {
        match *value {
            TelemetryValue::Speed(v) => self.speed_mph = Some(v),
            TelemetryValue::Odometer(v) => self.odometer_mi = Some(v),
            TelemetryValue::BatteryCurrent(v) => self.current_a = Some(v),
            TelemetryValue::PackVoltage(v) => self.voltage_v = Some(v),
            TelemetryValue::StateOfCharge(v) => self.soc = Some(v),
            TelemetryValue::StateOfChargeHd(v) => self.soc_hd = Some(v),
            TelemetryValue::AmbientTemperature(v) => self.ambient_temp_f = Some(v),
            TelemetryValue::BatteryAvgTemperature(v) => self.battery_avg_temp_c = Some(v),
            TelemetryValue::BatteryMaxTemperature(v) => self.battery_max_temp_c = Some(v),
            TelemetryValue::BatteryMinTemperature(v) => self.battery_min_temp_c = Some(v),
            TelemetryValue::BatteryCoolantTemperature(v) => self.battery_coolant_temp_c = Some(v),
            TelemetryValue::HvacMeasuredPower(v) => self.hvac_measured_power_w = Some(v),
            TelemetryValue::HvacCommandedPower(v) => self.hvac_commanded_power_w = Some(v),
            TelemetryValue::AcCompressor(on) => self.ac_compressor_on = Some(on),
            TelemetryValue::BatteryCapacity(v) => self.battery_capacity_ah = Some(v),
            TelemetryValue::BatteryResistance(v) => self.battery_resistance_mohm = Some(v),
        }
    }

    /// Returns true if no telemetry field has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.populated_fields() == 0
    }

    /// Number of telemetry fields that carry a value.
    #[must_use]
    pub fn populated_fields(&self) -> usize {
        let numeric = [
            self.soc,
            self.soc_hd,
            self.speed_mph,
            self.current_a,
            self.voltage_v,
            self.odometer_mi,
            self.ambient_temp_f,
            self.battery_avg_temp_c,
            self.battery_max_temp_c,
            self.battery_min_temp_c,
            self.battery_coolant_temp_c,
            self.hvac_measured_power_w,
            self.hvac_commanded_power_w,
            self.battery_capacity_ah,
            self.battery_resistance_mohm,
        ];
        numeric.iter().filter(|v| v.is_some()).count() + usize::from(self.ac_compressor_on.is_some())
    }
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self::now()
    }
}

/// Parse `count` two-digit hex byte groups from the start of `payload`.
///
/// Any characters after the required groups are ignored.
///
/// # Examples
///
/// ```
/// use evinfo_types::types::hex_bytes;
///
/// assert_eq!(hex_bytes("FF38", 2).unwrap(), vec![0xFF, 0x38]);
/// assert!(hex_bytes("FF", 2).is_err());
/// ```
pub fn hex_bytes(payload: &str, count: usize) -> ParseResult<Vec<u8>> {
    let available = payload.len() / 2;
    if available < count {
        return Err(ParseError::InsufficientData {
            expected: count,
            actual: available,
        });
    }

    (0..count)
        .map(|i| {
            let group = payload
                .get(i * 2..i * 2 + 2)
                .ok_or_else(|| ParseError::InvalidHex(payload.to_string()))?;
            // from_str_radix tolerates a leading sign
            if !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseError::InvalidHex(group.to_string()));
            }
            u8::from_str_radix(group, 16).map_err(|_| ParseError::InvalidHex(group.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Any byte pair written as uppercase or lowercase hex parses back.
        #[test]
        fn hex_bytes_reads_formatted_pairs(b0: u8, b1: u8, lower: bool) {
            let payload = if lower {
                format!("{b0:02x}{b1:02x}")
            } else {
                format!("{b0:02X}{b1:02X}")
            };
            prop_assert_eq!(hex_bytes(&payload, 2).unwrap(), vec![b0, b1]);
        }

        /// A group with a non-hex digit is rejected, never misread.
        #[test]
        fn hex_bytes_rejects_non_hex_groups(bad in "[g-zG-Z+ -]", digit in "[0-9A-F]") {
            let payload = format!("{bad}{digit}");
            prop_assert!(matches!(hex_bytes(&payload, 1), Err(ParseError::InvalidHex(_))));
        }

        /// Arbitrary input never panics.
        #[test]
        fn hex_bytes_never_panics(payload in ".{0,12}", count in 0usize..8) {
            let _ = hex_bytes(&payload, count);
        }
    }
}
