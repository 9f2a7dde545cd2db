//! Output formatting for session output.

use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use evinfo_core::state::EFFICIENCY_UNAVAILABLE;
use evinfo_core::{SessionEvent, VehicleState};
use evinfo_types::TelemetryValue;

/// One decoded value, prefixed with the session clock.
pub fn format_value_text(value: &TelemetryValue, elapsed: Duration) -> String {
    format!("[{:>8.1}s] {value}\n", elapsed.as_secs_f64())
}

/// One-line summary of the live vehicle state.
pub fn format_snapshot_text(state: &VehicleState) -> String {
    let efficiency = if state.efficiency == EFFICIENCY_UNAVAILABLE {
        "--".to_string()
    } else {
        format!("{:.2}", state.efficiency)
    };
    format!(
        "SoC {:.1}% | {:.1} V {:.2} A {:.2} kW | {:.1} mph | {} mi/kWh | trip {:.2} mi\n",
        state.soc,
        state.voltage,
        state.current,
        state.power,
        state.speed,
        efficiency,
        state.relative_distance
    )
}

/// Lifecycle events that are worth a line of text; `None` for the rest.
pub fn format_event_text(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Connected => Some("Adapter connected\n".to_string()),
        SessionEvent::PhaseChanged { phase } => Some(format!("Session {phase}\n")),
        SessionEvent::InitTimeout { command } => {
            Some(format!("No reply to {command} during setup, skipped\n"))
        }
        SessionEvent::Disconnected { reason } => Some(format!("Disconnected: {reason}\n")),
        _ => None,
    }
}

/// An event as a single JSON line.
pub fn format_event_json(event: &SessionEvent) -> Result<String> {
    Ok(format!("{}\n", serde_json::to_string(event)?))
}

/// A state snapshot as a single JSON line.
pub fn format_snapshot_json(state: &VehicleState) -> Result<String> {
    let value = json!({ "type": "snapshot", "state": state });
    Ok(format!("{value}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use evinfo_core::{DisconnectReason, Phase};

    fn driving_state() -> VehicleState {
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::StateOfCharge(72.5));
        state.apply(&TelemetryValue::PackVoltage(350.0));
        state.apply(&TelemetryValue::BatteryCurrent(20.0));
        state.apply(&TelemetryValue::Speed(35.0));
        state
    }

    #[test]
    fn test_value_line() {
        let line = format_value_text(
            &TelemetryValue::PackVoltage(352.5),
            Duration::from_millis(12_340),
        );
        assert_eq!(line, "[    12.3s] voltage 352.5 V\n");
    }

    #[test]
    fn test_snapshot_text() {
        let line = format_snapshot_text(&driving_state());
        assert_eq!(
            line,
            "SoC 72.5% | 350.0 V 20.00 A 7.00 kW | 35.0 mph | 5.00 mi/kWh | trip 0.00 mi\n"
        );
    }

    #[test]
    fn test_snapshot_text_without_efficiency() {
        // Moving with no power draw
        let mut state = VehicleState::new();
        state.apply(&TelemetryValue::Speed(10.0));
        let line = format_snapshot_text(&state);
        assert!(line.contains("| -- mi/kWh |"), "{line}");
    }

    #[test]
    fn test_event_text() {
        assert_eq!(
            format_event_text(&SessionEvent::PhaseChanged {
                phase: Phase::Polling
            }),
            Some("Session polling\n".to_string())
        );
        assert_eq!(
            format_event_text(&SessionEvent::Disconnected {
                reason: DisconnectReason::TransportClosed
            }),
            Some("Disconnected: transport closed\n".to_string())
        );
        assert_eq!(
            format_event_text(&SessionEvent::Telemetry {
                value: TelemetryValue::Speed(10.0)
            }),
            None
        );
    }

    #[test]
    fn test_event_json() {
        let line = format_event_json(&SessionEvent::Telemetry {
            value: TelemetryValue::PackVoltage(165.0),
        })
        .unwrap();
        assert_eq!(
            line,
            "{\"type\":\"telemetry\",\"value\":{\"kind\":\"pack_voltage\",\"value\":165.0}}\n"
        );
    }

    #[test]
    fn test_snapshot_json() {
        let line = format_snapshot_json(&driving_state()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "snapshot");
        assert_eq!(parsed["state"]["voltage"], 350.0);
        assert_eq!(parsed["state"]["soc"], 72.5);
    }
}
