//! Response decoder for adapter replies.
//!
//! Turns the raw text of one adapter reply into a typed [`TelemetryValue`].
//! Replies are matched against an ordered table of positive-response
//! prefixes; the hex byte groups that follow the prefix are decoded with the
//! layout registered for it.
//!
//! Decoding is pure: the same text always produces the same result, and
//! nothing here blocks or panics on bad input.

use evinfo_types::{ParseError, TelemetryValue, hex_bytes};
use tracing::{debug, warn};

/// Conversion factor from kilometres to miles.
pub const KM_TO_MILES: f64 = 0.621371;

/// A known positive-response prefix and how to decode its payload.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePattern {
    /// Positive-response prefix, e.g. `6240D4`.
    pub prefix: &'static str,
    /// Number of payload bytes that follow the prefix.
    pub byte_count: usize,
    decode: fn(&[u8]) -> TelemetryValue,
}

impl ResponsePattern {
    /// Decode payload bytes. `bytes` must hold at least `byte_count` bytes.
    pub fn decode(&self, bytes: &[u8]) -> TelemetryValue {
        (self.decode)(bytes)
    }
}

fn word(b: &[u8]) -> f64 {
    f64::from(b[0]) * 256.0 + f64::from(b[1])
}

// High byte is two's complement, low byte is unsigned.
fn signed_word(b: &[u8]) -> f64 {
    f64::from(b[0] as i8) * 256.0 + f64::from(b[1])
}

fn celsius(a: u8) -> f64 {
    f64::from(a) - 40.0
}

/// Response prefixes in match order.
///
/// A prefix that occurs inside another prefix must be listed after it, so the
/// more specific pattern always wins.
pub static RESPONSE_TABLE: &[ResponsePattern] = &[
    ResponsePattern {
        prefix: "6240D4",
        byte_count: 2,
        decode: |b| TelemetryValue::BatteryCurrent(signed_word(b) / 20.0),
    },
    ResponsePattern {
        prefix: "62000D",
        byte_count: 1,
        decode: |b| TelemetryValue::Speed(f64::from(b[0]) * KM_TO_MILES),
    },
    ResponsePattern {
        prefix: "622885",
        byte_count: 2,
        decode: |b| TelemetryValue::PackVoltage(word(b) / 2.0),
    },
    ResponsePattern {
        prefix: "628334",
        byte_count: 1,
        decode: |b| TelemetryValue::StateOfCharge(f64::from(b[0]) * 100.0 / 255.0),
    },
    ResponsePattern {
        prefix: "6243AF",
        byte_count: 2,
        decode: |b| TelemetryValue::StateOfChargeHd(word(b) * 100.0 / 65535.0),
    },
    ResponsePattern {
        prefix: "62434F",
        byte_count: 1,
        decode: |b| TelemetryValue::BatteryAvgTemperature(celsius(b[0])),
    },
    ResponsePattern {
        prefix: "624349",
        byte_count: 1,
        decode: |b| TelemetryValue::BatteryMaxTemperature(celsius(b[0])),
    },
    ResponsePattern {
        prefix: "62434A",
        byte_count: 1,
        decode: |b| TelemetryValue::BatteryMinTemperature(celsius(b[0])),
    },
    ResponsePattern {
        prefix: "6241A4",
        byte_count: 1,
        decode: |b| TelemetryValue::BatteryCoolantTemperature(celsius(b[0])),
    },
    ResponsePattern {
        prefix: "6241B2",
        byte_count: 2,
        decode: |b| TelemetryValue::HvacMeasuredPower(signed_word(b)),
    },
    ResponsePattern {
        prefix: "6241B1",
        byte_count: 2,
        decode: |b| TelemetryValue::HvacCommandedPower(signed_word(b)),
    },
    ResponsePattern {
        prefix: "62451F",
        byte_count: 1,
        decode: |b| TelemetryValue::AcCompressor(b[0] != 1),
    },
    ResponsePattern {
        prefix: "6245F9",
        byte_count: 2,
        decode: |b| TelemetryValue::BatteryCapacity(word(b) / 100.0),
    },
    ResponsePattern {
        prefix: "624357",
        byte_count: 2,
        decode: |b| TelemetryValue::BatteryResistance(word(b) / 10.0),
    },
    ResponsePattern {
        prefix: "4131",
        byte_count: 2,
        decode: |b| TelemetryValue::Odometer(word(b) * KM_TO_MILES),
    },
    ResponsePattern {
        prefix: "4146",
        byte_count: 1,
        decode: |b| TelemetryValue::AmbientTemperature(celsius(b[0]) * 9.0 / 5.0 + 32.0),
    },
];

/// Classification of a single adapter reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A recognised positive response.
    Telemetry(TelemetryValue),
    /// A recognised prefix followed by an unusable payload.
    Malformed {
        /// The prefix that matched.
        prefix: &'static str,
        /// Why the payload could not be decoded.
        error: ParseError,
    },
    /// `OK`, the adapter accepted a directive.
    Acknowledged,
    /// `?` or `ERROR`, the adapter rejected the command.
    Rejected,
    /// Anything else (`NO DATA`, `SEARCHING...`, banners).
    Other(String),
}

/// Strip whitespace and control characters and upper-case the rest.
pub fn canonicalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Classify a reply without logging.
pub fn classify(text: &str) -> Response {
    let canonical = canonicalize(text);

    for pattern in RESPONSE_TABLE {
        if let Some(pos) = canonical.find(pattern.prefix) {
            let payload = &canonical[pos + pattern.prefix.len()..];
            return match hex_bytes(payload, pattern.byte_count) {
                Ok(bytes) => Response::Telemetry(pattern.decode(&bytes)),
                Err(error) => Response::Malformed {
                    prefix: pattern.prefix,
                    error,
                },
            };
        }
    }

    if canonical.contains("OK") {
        Response::Acknowledged
    } else if canonical.contains('?') || canonical.contains("ERROR") {
        Response::Rejected
    } else {
        Response::Other(canonical)
    }
}

/// Decode a reply into a telemetry value.
///
/// Replies that are not telemetry are logged and yield `None`.
///
/// # Examples
///
/// ```
/// use evinfo_core::decoder::decode;
/// use evinfo_types::TelemetryValue;
///
/// assert_eq!(decode("62 28 85 01 4A\r"), Some(TelemetryValue::PackVoltage(165.0)));
/// assert_eq!(decode("NO DATA"), None);
/// ```
pub fn decode(text: &str) -> Option<TelemetryValue> {
    match classify(text) {
        Response::Telemetry(value) => {
            debug!("Decoded {value}");
            Some(value)
        }
        Response::Malformed { prefix, error } => {
            warn!("Malformed {prefix} response {:?}: {error}", text.trim());
            None
        }
        Response::Acknowledged => {
            debug!("Adapter acknowledged");
            None
        }
        Response::Rejected => {
            warn!("Adapter rejected command: {:?}", text.trim());
            None
        }
        Response::Other(canonical) => {
            debug!("Unrecognized response: {canonical}");
            None
        }
    }
}
