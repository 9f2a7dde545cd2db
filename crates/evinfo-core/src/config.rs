//! Session timing configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::accumulator::DEFAULT_FLUSH_SAFETY_FACTOR;
use crate::catalog::Cadence;
use crate::error::{Error, Result};

/// Minimum poll interval in milliseconds.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;

/// Maximum poll interval in milliseconds (10 seconds).
pub const MAX_POLL_INTERVAL_MS: u64 = 10_000;

/// Timing and cadence of a polling session.
///
/// Durations are stored in milliseconds so the struct maps directly onto a
/// config file section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Time between polling ticks.
    pub poll_interval_ms: u64,
    /// How long to wait for a reply to a polling request.
    pub response_timeout_ms: u64,
    /// How long to wait for the prompt after an init command.
    pub init_response_timeout_ms: u64,
    /// Pause between consecutive init commands.
    pub init_command_gap_ms: u64,
    /// Pause between the last init command and the first poll.
    pub settle_delay_ms: u64,
    /// Include the slow tier every this many cycles.
    pub slow_cycle_interval: u64,
    /// Minimum time between trip tier inclusions.
    pub trip_poll_interval_ms: u64,
    /// Multiplier applied to the expected cycle duration before flushing.
    pub flush_safety_factor: f64,
    /// Capacity of the session event channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            response_timeout_ms: 2_500,
            init_response_timeout_ms: 3_000,
            init_command_gap_ms: 500,
            settle_delay_ms: 2_000,
            slow_cycle_interval: 5,
            trip_poll_interval_ms: 60_000,
            flush_safety_factor: DEFAULT_FLUSH_SAFETY_FACTOR,
            event_capacity: 100,
        }
    }
}

impl SessionConfig {
    /// Set the poll interval.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set the polling response timeout.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the init response timeout.
    #[must_use]
    pub fn init_response_timeout(mut self, timeout: Duration) -> Self {
        self.init_response_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the gap between init commands.
    #[must_use]
    pub fn init_command_gap(mut self, gap: Duration) -> Self {
        self.init_command_gap_ms = duration_ms(gap);
        self
    }

    /// Set the settling delay.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = duration_ms(delay);
        self
    }

    /// Set the slow tier cadence.
    #[must_use]
    pub fn slow_cycle_interval(mut self, cycles: u64) -> Self {
        self.slow_cycle_interval = cycles;
        self
    }

    /// Set the trip tier cadence.
    #[must_use]
    pub fn trip_poll_interval(mut self, interval: Duration) -> Self {
        self.trip_poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn init_response_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.init_response_timeout_ms)
    }

    pub fn init_command_gap_duration(&self) -> Duration {
        Duration::from_millis(self.init_command_gap_ms)
    }

    pub fn settle_delay_duration(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Tier cadence derived from this configuration.
    pub fn cadence(&self) -> Cadence {
        Cadence {
            slow_cycle_interval: self.slow_cycle_interval,
            trip_poll_interval: Duration::from_millis(self.trip_poll_interval_ms),
        }
    }

    /// Validate the configuration.
    ///
    /// `prefix` is prepended to field names in the returned errors, e.g.
    /// `session`.
    pub fn validate(&self, prefix: &str) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let field = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };

        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            errors.push(ValidationError {
                field: field("poll_interval_ms"),
                message: format!(
                    "poll interval {} ms is too short (minimum {} ms)",
                    self.poll_interval_ms, MIN_POLL_INTERVAL_MS
                ),
            });
        } else if self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            errors.push(ValidationError {
                field: field("poll_interval_ms"),
                message: format!(
                    "poll interval {} ms is too long (maximum {} ms)",
                    self.poll_interval_ms, MAX_POLL_INTERVAL_MS
                ),
            });
        }

        for (name, value) in [
            ("response_timeout_ms", self.response_timeout_ms),
            ("init_response_timeout_ms", self.init_response_timeout_ms),
            ("trip_poll_interval_ms", self.trip_poll_interval_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError {
                    field: field(name),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.slow_cycle_interval == 0 {
            errors.push(ValidationError {
                field: field("slow_cycle_interval"),
                message: "must be at least 1 cycle".to_string(),
            });
        }

        if !self.flush_safety_factor.is_finite() || self.flush_safety_factor < 1.0 {
            errors.push(ValidationError {
                field: field("flush_safety_factor"),
                message: format!(
                    "safety factor {} must be a finite number of at least 1.0",
                    self.flush_safety_factor
                ),
            });
        }

        if self.event_capacity == 0 {
            errors.push(ValidationError {
                field: field("event_capacity"),
                message: "must be greater than zero".to_string(),
            });
        }

        errors
    }

    /// Validate, converting any failures into a single error.
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate("");
        if errors.is_empty() {
            Ok(())
        } else {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(Error::invalid_config(joined))
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `session.poll_interval_ms`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.poll_interval_duration(), Duration::from_millis(500));
        assert_eq!(config.response_timeout_duration(), Duration::from_millis(2500));
        assert_eq!(config.init_response_timeout_duration(), Duration::from_secs(3));
        assert_eq!(config.init_command_gap_duration(), Duration::from_millis(500));
        assert_eq!(config.settle_delay_duration(), Duration::from_secs(2));
        assert_eq!(config.cadence(), Cadence::default());
        assert!(config.validate("session").is_empty());
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::default()
            .poll_interval(Duration::from_millis(250))
            .response_timeout(Duration::from_secs(1))
            .settle_delay(Duration::ZERO)
            .slow_cycle_interval(3);

        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.response_timeout_ms, 1000);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.slow_cycle_interval, 3);
    }

    #[test]
    fn test_poll_interval_bounds() {
        let short = SessionConfig::default().poll_interval(Duration::from_millis(10));
        let errors = short.validate("session");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "session.poll_interval_ms");
        assert!(errors[0].message.contains("too short"));

        let long = SessionConfig::default().poll_interval(Duration::from_secs(60));
        let errors = long.validate("");
        assert_eq!(errors[0].field, "poll_interval_ms");
        assert!(errors[0].message.contains("too long"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let config = SessionConfig {
            response_timeout_ms: 0,
            slow_cycle_interval: 0,
            event_capacity: 0,
            ..SessionConfig::default()
        };
        let fields: Vec<_> = config.validate("").into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            ["response_timeout_ms", "slow_cycle_interval", "event_capacity"]
        );
    }

    #[test]
    fn test_safety_factor_rejected_below_one() {
        let config = SessionConfig {
            flush_safety_factor: 0.5,
            ..SessionConfig::default()
        };
        let err = config.ensure_valid().unwrap_err();
        assert!(err.to_string().contains("flush_safety_factor"));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{"poll_interval_ms": 750}"#).unwrap();
        assert_eq!(config.poll_interval_ms, 750);
        assert_eq!(config.response_timeout_ms, 2500);
        assert_eq!(config.slow_cycle_interval, 5);
    }

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError {
            field: "session.poll_interval_ms".to_string(),
            message: "too short".to_string(),
        };
        assert_eq!(error.to_string(), "session.poll_interval_ms: too short");
    }
}
