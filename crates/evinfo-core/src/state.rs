//! Live vehicle state with derived metrics.
//!
//! [`VehicleState`] holds the latest value of every telemetry quantity and
//! recomputes power, efficiency and trip distance whenever an input changes.

use evinfo_types::TelemetryValue;
use serde::{Deserialize, Serialize};

/// Efficiency reported when speed/power is negative or implausibly high.
pub const EFFICIENCY_UNAVAILABLE: f64 = -1.0;

/// Ratios above this are treated as unavailable.
pub const MAX_EFFICIENCY: f64 = 20.0;

/// Latest telemetry plus derived metrics.
///
/// Raw fields default to zero (or `false`) until a value arrives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Speed (mph).
    pub speed: f64,
    /// Odometer (mi).
    pub odometer: f64,
    /// Battery current (A).
    pub current: f64,
    /// Pack voltage (V).
    pub voltage: f64,
    /// Displayed state of charge (%).
    pub soc: f64,
    /// High resolution state of charge (%).
    pub soc_hd: f64,
    /// Ambient temperature (°F).
    pub ambient_temp_f: f64,
    pub battery_avg_temp_c: f64,
    pub battery_max_temp_c: f64,
    pub battery_min_temp_c: f64,
    pub battery_coolant_temp_c: f64,
    pub hvac_measured_power_w: f64,
    pub hvac_commanded_power_w: f64,
    pub ac_compressor_on: bool,
    pub battery_capacity_ah: f64,
    pub battery_resistance_mohm: f64,

    /// `current * voltage / 1000` (kW).
    pub power: f64,
    /// `|speed / power|` (mi/kWh), or [`EFFICIENCY_UNAVAILABLE`].
    pub efficiency: f64,
    /// Distance since the odometer baseline was captured (mi).
    pub relative_distance: f64,

    #[serde(skip)]
    odometer_seen: bool,
    #[serde(skip)]
    baseline: Option<f64>,
}

impl VehicleState {
    /// Create a state with every field zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a decoded value into the state.
    pub fn apply(&mut self, value: &TelemetryValue) {
        match *value {
            TelemetryValue::Speed(v) => {
                self.speed = v;
                self.update_efficiency();
            }
            TelemetryValue::BatteryCurrent(v) => {
                self.current = v;
                self.update_power();
            }
            TelemetryValue::PackVoltage(v) => {
                self.voltage = v;
                self.update_power();
            }
            TelemetryValue::Odometer(v) => {
                self.odometer = v;
                self.odometer_seen = true;
                let baseline = *self.baseline.get_or_insert(v);
                self.relative_distance = v - baseline;
            }
            TelemetryValue::StateOfCharge(v) => self.soc = v,
            TelemetryValue::StateOfChargeHd(v) => self.soc_hd = v,
            TelemetryValue::AmbientTemperature(v) => self.ambient_temp_f = v,
            TelemetryValue::BatteryAvgTemperature(v) => self.battery_avg_temp_c = v,
            TelemetryValue::BatteryMaxTemperature(v) => self.battery_max_temp_c = v,
            TelemetryValue::BatteryMinTemperature(v) => self.battery_min_temp_c = v,
            TelemetryValue::BatteryCoolantTemperature(v) => self.battery_coolant_temp_c = v,
            TelemetryValue::HvacMeasuredPower(v) => self.hvac_measured_power_w = v,
            TelemetryValue::HvacCommandedPower(v) => self.hvac_commanded_power_w = v,
            TelemetryValue::AcCompressor(on) => self.ac_compressor_on = on,
            TelemetryValue::BatteryCapacity(v) => self.battery_capacity_ah = v,
            TelemetryValue::BatteryResistance(v) => self.battery_resistance_mohm = v,
        }
    }

    /// Restart trip distance from the current odometer.
    ///
    /// If no odometer reading has arrived yet, the next one becomes the
    /// baseline.
    pub fn reset_distance(&mut self) {
        self.baseline = self.odometer_seen.then_some(self.odometer);
        self.relative_distance = 0.0;
    }

    /// The odometer value trip distance is measured from, once known.
    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    fn update_power(&mut self) {
        self.power = self.current * self.voltage / 1000.0;
        self.update_efficiency();
    }

    fn update_efficiency(&mut self) {
        self.efficiency = efficiency(self.speed, self.power);
    }
}

/// `|speed / power|`, or [`EFFICIENCY_UNAVAILABLE`] when the ratio is
/// negative, above [`MAX_EFFICIENCY`], or undefined.
pub fn efficiency(speed: f64, power: f64) -> f64 {
    let ratio = speed / power;
    if !ratio.is_finite() || ratio < 0.0 || ratio > MAX_EFFICIENCY {
        EFFICIENCY_UNAVAILABLE
    } else {
        ratio.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_zeroed() {
        let state = VehicleState::new();
        assert_eq!(state.power, 0.0);
        assert_eq!(state.efficiency, 0.0);
        assert_eq!(state.relative_distance, 0.0);
        assert!(!state.ac_compressor_on);
        assert_eq!(state.baseline(), None);
    }

    // --- Power and efficiency ---

    #[test]
    fn test_power_from_current_and_voltage() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::BatteryCurrent(20.0));
        assert_eq!(state.power, 0.0);

        state.apply(&TelemetryValue::PackVoltage(350.0));
        assert!((state.power - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_recomputed_on_speed() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::BatteryCurrent(20.0));
        state.apply(&TelemetryValue::PackVoltage(350.0));
        state.apply(&TelemetryValue::Speed(28.0));

        assert!((state.efficiency - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_efficiency_recomputed_on_power_change() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Speed(28.0));
        state.apply(&TelemetryValue::PackVoltage(350.0));
        state.apply(&TelemetryValue::BatteryCurrent(40.0));

        assert!((state.efficiency - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_regeneration_gives_sentinel() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Speed(30.0));
        state.apply(&TelemetryValue::PackVoltage(350.0));
        state.apply(&TelemetryValue::BatteryCurrent(-10.0));

        assert!(state.power < 0.0);
        assert_eq!(state.efficiency, EFFICIENCY_UNAVAILABLE);
    }

    #[test]
    fn test_efficiency_bounds() {
        assert_eq!(efficiency(20.0, 1.0), 20.0);
        assert_eq!(efficiency(21.0, 1.0), EFFICIENCY_UNAVAILABLE);
        assert_eq!(efficiency(-5.0, 1.0), EFFICIENCY_UNAVAILABLE);
        assert_eq!(efficiency(5.0, 0.0), EFFICIENCY_UNAVAILABLE);
        assert_eq!(efficiency(0.0, 0.0), EFFICIENCY_UNAVAILABLE);
        assert_eq!(efficiency(0.0, -3.0), 0.0);
        assert_eq!(efficiency(10.0, 4.0), 2.5);
    }

    #[test]
    fn test_standing_still_without_power_gives_sentinel() {
        // 0 mph at 0 kW is an undefined ratio, reported as unavailable
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::PackVoltage(350.0));
        state.apply(&TelemetryValue::BatteryCurrent(0.0));
        state.apply(&TelemetryValue::Speed(0.0));

        assert_eq!(state.power, 0.0);
        assert_eq!(state.efficiency, EFFICIENCY_UNAVAILABLE);
        assert!(!state.efficiency.is_nan());
    }

    // --- Trip distance ---

    #[test]
    fn test_first_odometer_sets_baseline() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Odometer(1200.0));

        assert_eq!(state.baseline(), Some(1200.0));
        assert_eq!(state.relative_distance, 0.0);

        state.apply(&TelemetryValue::Odometer(1203.5));
        assert!((state.relative_distance - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_reset_distance_snaps_to_current_odometer() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Odometer(100.0));
        state.apply(&TelemetryValue::Odometer(110.0));
        state.reset_distance();

        assert_eq!(state.relative_distance, 0.0);
        assert_eq!(state.baseline(), Some(110.0));

        state.apply(&TelemetryValue::Odometer(112.0));
        assert!((state.relative_distance - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_before_any_reading_defers_baseline() {
        let mut state = VehicleState::new();
        state.reset_distance();
        assert_eq!(state.baseline(), None);

        state.apply(&TelemetryValue::Odometer(500.0));
        assert_eq!(state.baseline(), Some(500.0));
        assert_eq!(state.relative_distance, 0.0);
    }

    #[test]
    fn test_other_values_overwrite_fields() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::StateOfCharge(80.0));
        state.apply(&TelemetryValue::AcCompressor(true));
        state.apply(&TelemetryValue::BatteryCoolantTemperature(22.0));

        assert_eq!(state.soc, 80.0);
        assert!(state.ac_compressor_on);
        assert_eq!(state.battery_coolant_temp_c, 22.0);
        assert_eq!(state.power, 0.0);
    }

    #[test]
    fn test_apply_handles_every_value_kind() {
        let values = [
            TelemetryValue::Speed(30.0),
            TelemetryValue::Odometer(1000.0),
            TelemetryValue::BatteryCurrent(20.0),
            TelemetryValue::PackVoltage(350.0),
            TelemetryValue::StateOfCharge(81.0),
            TelemetryValue::StateOfChargeHd(80.5),
            TelemetryValue::AmbientTemperature(68.0),
            TelemetryValue::BatteryAvgTemperature(25.0),
            TelemetryValue::BatteryMaxTemperature(27.0),
            TelemetryValue::BatteryMinTemperature(23.0),
            TelemetryValue::BatteryCoolantTemperature(22.0),
            TelemetryValue::HvacMeasuredPower(1500.0),
            TelemetryValue::HvacCommandedPower(1600.0),
            TelemetryValue::AcCompressor(true),
            TelemetryValue::BatteryCapacity(52.0),
            TelemetryValue::BatteryResistance(95.0),
        ];
        let mut state = VehicleState::new();
        for value in &values {
            state.apply(value);
        }

        assert_eq!(state.speed, 30.0);
        assert_eq!(state.odometer, 1000.0);
        assert!((state.power - 7.0).abs() < 1e-9);
        assert_eq!(state.soc, 81.0);
        assert_eq!(state.soc_hd, 80.5);
        assert_eq!(state.ambient_temp_f, 68.0);
        assert_eq!(state.battery_avg_temp_c, 25.0);
        assert_eq!(state.battery_max_temp_c, 27.0);
        assert_eq!(state.battery_min_temp_c, 23.0);
        assert_eq!(state.battery_coolant_temp_c, 22.0);
        assert_eq!(state.hvac_measured_power_w, 1500.0);
        assert_eq!(state.hvac_commanded_power_w, 1600.0);
        assert!(state.ac_compressor_on);
        assert_eq!(state.battery_capacity_ah, 52.0);
        assert_eq!(state.battery_resistance_mohm, 95.0);
    }

    #[test]
    fn test_state_serializes_without_private_fields() {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Odometer(10.0));
        let json = serde_json::to_value(&state).unwrap();

        assert_eq!(json["odometer"], 10.0);
        assert!(json.get("baseline").is_none());
        assert!(json.get("odometer_seen").is_none());
    }
}
