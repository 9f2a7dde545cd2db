//! Batching of decoded values into persisted records.

use std::time::Duration;

use evinfo_types::{TelemetryRecord, TelemetryValue};
use time::OffsetDateTime;
use tokio::time::Instant;

/// Default multiplier applied to the expected cycle duration.
pub const DEFAULT_FLUSH_SAFETY_FACTOR: f64 = 1.2;

/// Collects decoded values into a pending [`TelemetryRecord`].
///
/// A window opens when the accumulator is created or flushed. Once it has
/// been open for longer than one full cycle (with a safety margin) the record
/// is ready to hand off.
#[derive(Debug)]
pub struct BatchAccumulator {
    record: TelemetryRecord,
    opened: Instant,
    safety_factor: f64,
}

impl BatchAccumulator {
    /// Open a window at `now`.
    pub fn new(now: Instant, safety_factor: f64) -> Self {
        Self {
            record: TelemetryRecord::now(),
            opened: now,
            safety_factor,
        }
    }

    /// Set the matching field of the pending record.
    pub fn on_value(&mut self, value: &TelemetryValue) {
        self.record.apply(value);
    }

    /// Returns true once the window has outlived one cycle plus margin.
    pub fn should_flush(&self, now: Instant, poll_interval: Duration, cycle_len: usize) -> bool {
        let threshold = poll_interval.mul_f64(cycle_len as f64 * self.safety_factor);
        now.saturating_duration_since(self.opened) > threshold
    }

    /// Close the window and open a fresh one at `now`.
    ///
    /// Returns the closed record unless nothing was decoded during the window.
    pub fn flush(&mut self, now: Instant) -> Option<TelemetryRecord> {
        let record = std::mem::replace(&mut self.record, TelemetryRecord::new(OffsetDateTime::now_utc()));
        self.opened = now;
        (!record.is_empty()).then_some(record)
    }

    /// Discard the pending record and open a fresh window at `now`.
    pub fn reset(&mut self, now: Instant) {
        self.record = TelemetryRecord::now();
        self.opened = now;
    }

    /// The record being filled.
    pub fn pending(&self) -> &TelemetryRecord {
        &self.record
    }

    /// When the current window opened.
    pub fn opened_at(&self) -> Instant {
        self.opened
    }
}
