//! Diagnostic command strings and response prefixes.
//!
//! This module contains the ELM327 adapter directives and the OBD-II
//! requests needed to read EV drivetrain telemetry, along with the
//! response prefixes a positive reply starts with.

// --- Adapter directives ---

/// Reset the adapter.
pub const AT_RESET: &str = "ATZ";

/// Restore adapter defaults.
pub const AT_DEFAULTS: &str = "ATD";

/// Disable command echo.
pub const AT_ECHO_OFF: &str = "ATE0";

/// Disable spaces between response bytes.
pub const AT_SPACES_OFF: &str = "ATS0";

/// Allow long (more than 7 byte) messages.
pub const AT_ALLOW_LONG: &str = "ATAL";

/// Select protocol 6 (ISO 15765-4 CAN, 11 bit ID, 500 kbaud).
pub const AT_PROTOCOL_CAN_11_500: &str = "ATSP6";

/// Address the engine control module.
pub const HEADER_ECM: &str = "ATSH7E0";

/// Address the battery energy control module.
pub const HEADER_BECM: &str = "ATSH7E4";

// --- Service 0x22 requests (manufacturer specific) ---

/// Battery pack current.
pub const BATTERY_CURRENT: &str = "2240D4";

/// Vehicle speed.
pub const VEHICLE_SPEED: &str = "22000D";

/// Battery pack voltage.
pub const PACK_VOLTAGE: &str = "222885";

/// Displayed state of charge.
pub const STATE_OF_CHARGE: &str = "228334";

/// High resolution state of charge.
pub const STATE_OF_CHARGE_HD: &str = "2243AF";

/// Battery average temperature.
pub const BATTERY_AVG_TEMP: &str = "22434F";

/// Battery maximum cell temperature.
pub const BATTERY_MAX_TEMP: &str = "224349";

/// Battery minimum cell temperature.
pub const BATTERY_MIN_TEMP: &str = "22434A";

/// Battery coolant temperature.
pub const BATTERY_COOLANT_TEMP: &str = "2241A4";

/// HVAC measured power draw.
pub const HVAC_MEASURED_POWER: &str = "2241B2";

/// HVAC commanded power.
pub const HVAC_COMMANDED_POWER: &str = "2241B1";

/// A/C compressor state.
pub const AC_COMPRESSOR: &str = "22451F";

/// Battery capacity estimate.
pub const BATTERY_CAPACITY: &str = "2245F9";

/// Battery internal resistance.
pub const BATTERY_RESISTANCE: &str = "224357";

// --- Service 0x01 requests (standard) ---

/// Distance travelled since diagnostic codes were cleared.
pub const ODOMETER: &str = "0131";

/// Ambient air temperature.
pub const AMBIENT_TEMP: &str = "0146";

/// Returns the positive-response prefix for a request.
///
/// The adapter answers a request for service `0xSS` with service `0xSS + 0x40`
/// followed by the same parameter id, so `2240D4` is answered with `6240D4`.
/// Adapter directives (`AT...`) have no response prefix.
///
/// # Examples
///
/// ```
/// use evinfo_types::pid::response_prefix;
///
/// assert_eq!(response_prefix("2240D4").as_deref(), Some("6240D4"));
/// assert_eq!(response_prefix("0131").as_deref(), Some("4131"));
/// assert_eq!(response_prefix("ATZ"), None);
/// ```
#[must_use]
pub fn response_prefix(request: &str) -> Option<String> {
    if is_directive(request) || request.len() < 2 {
        return None;
    }
    let service = u8::from_str_radix(request.get(..2)?, 16).ok()?;
    let positive = service.checked_add(0x40)?;
    Some(format!("{positive:02X}{}", &request[2..]))
}

/// Returns true for adapter directives rather than vehicle requests.
#[must_use]
pub fn is_directive(command: &str) -> bool {
    command
        .get(..2)
        .is_some_and(|p| p.eq_ignore_ascii_case("AT"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_prefix_for_every_request() {
        let pairs = [
            (BATTERY_CURRENT, "6240D4"),
            (VEHICLE_SPEED, "62000D"),
            (PACK_VOLTAGE, "622885"),
            (STATE_OF_CHARGE, "628334"),
            (STATE_OF_CHARGE_HD, "6243AF"),
            (BATTERY_AVG_TEMP, "62434F"),
            (BATTERY_MAX_TEMP, "624349"),
            (BATTERY_MIN_TEMP, "62434A"),
            (BATTERY_COOLANT_TEMP, "6241A4"),
            (HVAC_MEASURED_POWER, "6241B2"),
            (HVAC_COMMANDED_POWER, "6241B1"),
            (AC_COMPRESSOR, "62451F"),
            (BATTERY_CAPACITY, "6245F9"),
            (BATTERY_RESISTANCE, "624357"),
            (ODOMETER, "4131"),
            (AMBIENT_TEMP, "4146"),
        ];
        for (request, expected) in pairs {
            assert_eq!(response_prefix(request).as_deref(), Some(expected), "{request}");
        }
    }

    #[test]
    fn test_directives_have_no_response_prefix() {
        assert_eq!(response_prefix(AT_RESET), None);
        assert_eq!(response_prefix(HEADER_BECM), None);
        assert_eq!(response_prefix("at sp6"), None);
    }

    #[test]
    fn test_garbage_request_has_no_prefix() {
        assert_eq!(response_prefix(""), None);
        assert_eq!(response_prefix("Z"), None);
        assert_eq!(response_prefix("ZZ01"), None);
        // 0xC0 + 0x40 overflows a byte
        assert_eq!(response_prefix("C001"), None);
    }

    #[test]
    fn test_directive_detection() {
        assert!(is_directive(HEADER_ECM));
        assert!(is_directive("atsh7e4"));
        assert!(!is_directive(BATTERY_CURRENT));
        assert!(is_directive(AT_PROTOCOL_CAN_11_500));
        assert!(!is_directive(ODOMETER));
    }
}
