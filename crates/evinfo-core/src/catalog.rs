//! Command catalog and per-cycle queue planning.
//!
//! The catalog holds the adapter initialization sequence and three polling
//! tiers with different cadences:
//!
//! - **fast**: drivetrain values needed for live power and efficiency, sent
//!   every cycle
//! - **slow**: battery and climate values, sent every Nth cycle
//! - **trip**: odometer, ambient and battery health, sent at most once per
//!   trip interval
//!
//! Each tier starts with its own header directive, so any combination of
//! tiers can be concatenated without a request going to the wrong module.

use std::time::Duration;

use evinfo_types::pid;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// A polling tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Fast,
    Slow,
    Trip,
}

/// Static command lists for one vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCatalog {
    /// Adapter setup commands, sent once per connection.
    pub init: Vec<String>,
    /// Sent every cycle.
    pub fast: Vec<String>,
    /// Sent when `cycle % slow_cycle_interval == 0`.
    pub slow: Vec<String>,
    /// Sent when the trip interval has elapsed.
    pub trip: Vec<String>,
}

fn owned(commands: &[&str]) -> Vec<String> {
    commands.iter().map(|c| (*c).to_string()).collect()
}

impl Default for CommandCatalog {
    fn default() -> Self {
        Self {
            init: owned(&[
                pid::AT_RESET,
                pid::AT_DEFAULTS,
                pid::AT_ECHO_OFF,
                pid::AT_SPACES_OFF,
                pid::AT_ALLOW_LONG,
                pid::AT_PROTOCOL_CAN_11_500,
            ]),
            fast: owned(&[
                pid::HEADER_BECM,
                pid::BATTERY_CURRENT,
                pid::PACK_VOLTAGE,
                pid::HEADER_ECM,
                pid::VEHICLE_SPEED,
            ]),
            slow: owned(&[
                pid::HEADER_BECM,
                pid::STATE_OF_CHARGE,
                pid::STATE_OF_CHARGE_HD,
                pid::BATTERY_AVG_TEMP,
                pid::BATTERY_MAX_TEMP,
                pid::BATTERY_MIN_TEMP,
                pid::BATTERY_COOLANT_TEMP,
                pid::HVAC_MEASURED_POWER,
                pid::HVAC_COMMANDED_POWER,
                pid::AC_COMPRESSOR,
            ]),
            trip: owned(&[
                pid::HEADER_ECM,
                pid::ODOMETER,
                pid::AMBIENT_TEMP,
                pid::HEADER_BECM,
                pid::BATTERY_CAPACITY,
                pid::BATTERY_RESISTANCE,
            ]),
        }
    }
}

/// Tier cadence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    /// Include the slow tier every this many cycles. Zero is treated as one.
    pub slow_cycle_interval: u64,
    /// Minimum time between trip tier inclusions.
    pub trip_poll_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            slow_cycle_interval: 5,
            trip_poll_interval: Duration::from_secs(60),
        }
    }
}

/// The commands to send during one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandQueue {
    commands: Vec<String>,
    tiers: Vec<Tier>,
    index: usize,
}

impl CommandQueue {
    /// The next command to send, advancing the queue.
    pub fn next_command(&mut self) -> Option<&str> {
        let command = self.commands.get(self.index)?;
        self.index += 1;
        Some(command)
    }

    /// Returns true once every command has been handed out.
    pub fn is_exhausted(&self) -> bool {
        self.index >= self.commands.len()
    }

    /// Number of commands in this cycle.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the cycle has no commands at all.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Position of the next command.
    pub fn position(&self) -> usize {
        self.index
    }

    /// Tiers included in this cycle, in order.
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// All commands in this cycle.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl CommandCatalog {
    /// Commands belonging to a tier.
    pub fn tier(&self, tier: Tier) -> &[String] {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Slow => &self.slow,
            Tier::Trip => &self.trip,
        }
    }

    /// Build the queue for `cycle`.
    ///
    /// `last_trip_poll` is updated to `now` when the trip tier is included.
    pub fn build_queue(
        &self,
        cycle: u64,
        cadence: &Cadence,
        last_trip_poll: &mut Option<Instant>,
        now: Instant,
    ) -> CommandQueue {
        let mut tiers = vec![Tier::Fast];

        if cycle % cadence.slow_cycle_interval.max(1) == 0 {
            tiers.push(Tier::Slow);
        }

        let trip_due = last_trip_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= cadence.trip_poll_interval);
        if trip_due {
            tiers.push(Tier::Trip);
            *last_trip_poll = Some(now);
        }

        let commands = tiers
            .iter()
            .flat_map(|tier| self.tier(*tier).iter().cloned())
            .collect();

        CommandQueue {
            commands,
            tiers,
            index: 0,
        }
    }
}
