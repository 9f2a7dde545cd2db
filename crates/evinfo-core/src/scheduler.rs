//! Polling session state machine.
//!
//! [`Scheduler`] owns the whole lifecycle of one adapter session without
//! doing any I/O itself. The owner feeds it connection changes, received
//! bytes and timer expiries, and drains the [`Action`]s it produces: bytes to
//! write, records to persist and events to publish.
//!
//! ```text
//! Idle --connected--> Initializing --last init cmd--> Settling --delay--> Polling
//!   ^                                                                        |
//!   +------------------------------ disconnected ----------------------------+
//! ```
//!
//! Timers are plain deadlines stored in the per-phase state. Leaving a phase
//! drops its deadlines with it, so a stale timer can never fire into the
//! wrong phase. [`Scheduler::next_deadline`] tells the owner when to call
//! [`Scheduler::on_timer`] next.
//!
//! While polling, at most one request is outstanding. A tick that finds a
//! request in flight is skipped; a reply or a response timeout frees the slot.
//! Timed out requests are never resent.

use std::time::Duration;

use evinfo_types::{TelemetryRecord, TelemetryValue};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::accumulator::BatchAccumulator;
use crate::catalog::{CommandCatalog, CommandQueue};
use crate::config::{MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS, SessionConfig};
use crate::decoder;
use crate::events::{DisconnectReason, SessionEvent};
use crate::state::VehicleState;

/// Prompt the adapter prints when it is ready for the next command.
pub const PROMPT: char = '>';

/// Terminator appended to every command on the wire.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Coarse session phase, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No connection.
    Idle,
    /// Running the adapter setup sequence.
    Initializing,
    /// Waiting for the adapter to settle before the first poll.
    Settling,
    /// Cycling through the command queue.
    Polling,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Initializing => "initializing",
            Phase::Settling => "settling",
            Phase::Polling => "polling",
        };
        f.write_str(name)
    }
}

/// Side effects requested by the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write these bytes to the transport.
    Send(String),
    /// Hand a completed record to storage.
    Persist(TelemetryRecord),
    /// Publish an event.
    Notify(SessionEvent),
}

#[derive(Debug)]
struct InitState {
    index: usize,
    buffer: String,
    /// Armed while an init command awaits its prompt.
    deadline: Option<Instant>,
    /// Armed while waiting out the gap before the next init command.
    send_at: Option<Instant>,
}

#[derive(Debug)]
struct Outstanding {
    command: String,
    deadline: Instant,
}

#[derive(Debug)]
struct PollState {
    queue: CommandQueue,
    cycle: u64,
    last_trip_poll: Option<Instant>,
    outstanding: Option<Outstanding>,
    next_tick: Instant,
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Initializing(InitState),
    Settling { until: Instant },
    Polling(PollState),
}

/// Sans-IO polling session.
#[derive(Debug)]
pub struct Scheduler {
    config: SessionConfig,
    catalog: CommandCatalog,
    state: SessionState,
    vehicle: VehicleState,
    accumulator: BatchAccumulator,
    actions: Vec<Action>,
}

impl Scheduler {
    /// Create an idle scheduler.
    pub fn new(config: SessionConfig, catalog: CommandCatalog) -> Self {
        let accumulator = BatchAccumulator::new(Instant::now(), config.flush_safety_factor);
        Self {
            config,
            catalog,
            state: SessionState::Idle,
            vehicle: VehicleState::new(),
            accumulator,
            actions: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            SessionState::Idle => Phase::Idle,
            SessionState::Initializing(_) => Phase::Initializing,
            SessionState::Settling { .. } => Phase::Settling,
            SessionState::Polling(_) => Phase::Polling,
        }
    }

    /// Latest vehicle state.
    pub fn vehicle_state(&self) -> &VehicleState {
        &self.vehicle
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current cycle number while polling.
    pub fn cycle(&self) -> Option<u64> {
        match &self.state {
            SessionState::Polling(poll) => Some(poll.cycle),
            _ => None,
        }
    }

    /// The request awaiting a reply, if any.
    pub fn outstanding_command(&self) -> Option<&str> {
        match &self.state {
            SessionState::Polling(poll) => poll.outstanding.as_ref().map(|o| o.command.as_str()),
            _ => None,
        }
    }

    /// Take the actions produced since the last call.
    pub fn drain_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    /// The earliest instant at which [`Scheduler::on_timer`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            SessionState::Idle => None,
            SessionState::Initializing(init) => init.deadline.or(init.send_at),
            SessionState::Settling { until } => Some(*until),
            SessionState::Polling(poll) => Some(match &poll.outstanding {
                Some(outstanding) => outstanding.deadline.min(poll.next_tick),
                None => poll.next_tick,
            }),
        }
    }

    // --- Inputs ---

    /// The transport came up. Always restarts initialization.
    pub fn on_connected(&mut self, now: Instant) {
        if !matches!(self.state, SessionState::Idle) {
            debug!("Connection reported while {:?}, restarting", self.phase());
            self.flush_pending(now);
        }
        info!("Adapter connected");
        self.notify(SessionEvent::Connected);
        self.start_init(now);
    }

    /// The transport went down, or writing to it failed.
    pub fn on_disconnected(&mut self, now: Instant, reason: DisconnectReason) {
        if matches!(self.state, SessionState::Idle) {
            debug!("Disconnect reported while idle");
            return;
        }
        info!("Adapter disconnected: {reason:?}");
        self.flush_pending(now);
        self.state = SessionState::Idle;
        self.notify(SessionEvent::Disconnected { reason });
        self.notify(SessionEvent::PhaseChanged { phase: Phase::Idle });
    }

    /// Shut the session down, flushing any partial record.
    pub fn shutdown(&mut self, now: Instant) {
        self.on_disconnected(now, DisconnectReason::Shutdown);
    }

    /// Bytes arrived from the adapter.
    pub fn on_data(&mut self, bytes: &[u8], now: Instant) {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                error!("Could not decode {} bytes from adapter: {e}", bytes.len());
                return;
            }
        };

        match &mut self.state {
            SessionState::Idle => debug!("Ignoring {} bytes while idle", bytes.len()),
            SessionState::Settling { .. } => debug!("Ignoring late init response {:?}", text.trim()),
            SessionState::Initializing(init) => {
                if init.deadline.is_none() {
                    debug!("Ignoring unsolicited init data {:?}", text.trim());
                    return;
                }
                init.buffer.push_str(text);
                if init.buffer.contains(PROMPT) {
                    debug!("Init response: {:?}", init.buffer.trim());
                    self.advance_init(now);
                }
            }
            SessionState::Polling(poll) => {
                let command = poll.outstanding.take().map(|o| o.command);
                let response = text.trim();
                if response.is_empty() {
                    debug!("Empty response to {command:?}");
                    return;
                }
                debug!("Response to {command:?}: {response:?}");
                if let Some(value) = decoder::decode(response) {
                    self.on_value(value, now);
                }
            }
        }
    }

    /// Process every deadline that has passed at `now`.
    pub fn on_timer(&mut self, now: Instant) {
        match &mut self.state {
            SessionState::Idle => {}
            SessionState::Initializing(init) => {
                if init.deadline.is_some_and(|d| d <= now) {
                    let command = self.catalog.init.get(init.index).cloned().unwrap_or_default();
                    warn!(
                        "Init command {command} got no prompt within {:?}, continuing",
                        self.config.init_response_timeout_duration()
                    );
                    self.actions.push(Action::Notify(SessionEvent::InitTimeout { command }));
                    self.advance_init(now);
                } else if init.send_at.is_some_and(|t| t <= now) {
                    self.send_init(now);
                }
            }
            SessionState::Settling { until } => {
                if *until <= now {
                    self.start_polling(now);
                }
            }
            SessionState::Polling(poll) => {
                if let Some(outstanding) = poll.outstanding.take_if(|o| o.deadline <= now) {
                    warn!(
                        "No response to {} within {:?}",
                        outstanding.command,
                        self.config.response_timeout_duration()
                    );
                    self.actions.push(Action::Notify(SessionEvent::ResponseTimeout {
                        command: outstanding.command,
                    }));
                }
                if poll.next_tick <= now {
                    let interval = self.config.poll_interval_duration();
                    poll.next_tick += interval;
                    if poll.next_tick <= now {
                        poll.next_tick = now + interval;
                    }
                    self.tick(now);
                }
            }
        }
    }

    /// Change the poll interval, re-arming the tick from `now`.
    ///
    /// The interval is truncated to whole milliseconds and clamped to
    /// [`MIN_POLL_INTERVAL_MS`]..=[`MAX_POLL_INTERVAL_MS`]. The queue position
    /// and cycle count are kept.
    pub fn set_poll_interval(&mut self, interval: Duration, now: Instant) {
        let ms = u64::try_from(interval.as_millis())
            .unwrap_or(u64::MAX)
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        self.config.poll_interval_ms = ms;
        let interval = self.config.poll_interval_duration();
        info!("Poll interval set to {interval:?}");
        if let SessionState::Polling(poll) = &mut self.state {
            poll.next_tick = now + interval;
        }
    }

    /// Restart trip distance from the current odometer reading.
    pub fn reset_distance(&mut self) {
        self.vehicle.reset_distance();
    }

    // --- Transitions ---

    fn start_init(&mut self, now: Instant) {
        if self.catalog.init.is_empty() {
            self.enter_settling(now);
            return;
        }
        self.state = SessionState::Initializing(InitState {
            index: 0,
            buffer: String::new(),
            deadline: None,
            send_at: None,
        });
        self.notify(SessionEvent::PhaseChanged {
            phase: Phase::Initializing,
        });
        self.send_init(now);
    }

    fn send_init(&mut self, now: Instant) {
        let SessionState::Initializing(init) = &mut self.state else {
            return;
        };
        let Some(command) = self.catalog.init.get(init.index) else {
            return;
        };
        debug!("Init {}/{}: {command}", init.index + 1, self.catalog.init.len());
        init.buffer.clear();
        init.send_at = None;
        init.deadline = Some(now + self.config.init_response_timeout_duration());
        self.actions.push(Action::Send(format!("{command}{COMMAND_TERMINATOR}")));
    }

    fn advance_init(&mut self, now: Instant) {
        let SessionState::Initializing(init) = &mut self.state else {
            return;
        };
        init.index += 1;
        init.deadline = None;
        init.buffer.clear();

        if init.index >= self.catalog.init.len() {
            self.enter_settling(now);
            return;
        }

        let gap = self.config.init_command_gap_duration();
        if gap.is_zero() {
            self.send_init(now);
        } else {
            init.send_at = Some(now + gap);
        }
    }

    fn enter_settling(&mut self, now: Instant) {
        let delay = self.config.settle_delay_duration();
        info!("Adapter initialized, settling for {delay:?}");
        if delay.is_zero() {
            self.start_polling(now);
            return;
        }
        self.state = SessionState::Settling { until: now + delay };
        self.notify(SessionEvent::PhaseChanged {
            phase: Phase::Settling,
        });
    }

    fn start_polling(&mut self, now: Instant) {
        let mut last_trip_poll = None;
        let queue = self
            .catalog
            .build_queue(0, &self.config.cadence(), &mut last_trip_poll, now);
        info!(
            "Polling every {:?}, first cycle has {} commands",
            self.config.poll_interval_duration(),
            queue.len()
        );
        let started = SessionEvent::CycleStarted {
            cycle: 0,
            tiers: queue.tiers().to_vec(),
            commands: queue.len(),
        };

        self.accumulator.reset(now);
        self.state = SessionState::Polling(PollState {
            queue,
            cycle: 0,
            last_trip_poll,
            outstanding: None,
            next_tick: now + self.config.poll_interval_duration(),
        });
        self.notify(SessionEvent::PhaseChanged {
            phase: Phase::Polling,
        });
        self.notify(started);
    }

    fn tick(&mut self, now: Instant) {
        let SessionState::Polling(poll) = &mut self.state else {
            return;
        };
        if let Some(outstanding) = &poll.outstanding {
            debug!("Skipping tick, awaiting response to {}", outstanding.command);
            return;
        }

        if poll.queue.is_exhausted() {
            poll.cycle += 1;
            poll.queue = self.catalog.build_queue(
                poll.cycle,
                &self.config.cadence(),
                &mut poll.last_trip_poll,
                now,
            );
            debug!("Cycle {} tiers {:?}", poll.cycle, poll.queue.tiers());
            self.actions.push(Action::Notify(SessionEvent::CycleStarted {
                cycle: poll.cycle,
                tiers: poll.queue.tiers().to_vec(),
                commands: poll.queue.len(),
            }));
        }

        let Some(command) = poll.queue.next_command().map(str::to_string) else {
            debug!("Cycle {} has no commands", poll.cycle);
            return;
        };
        debug!("Sending {command}");
        self.actions.push(Action::Send(format!("{command}{COMMAND_TERMINATOR}")));
        poll.outstanding = Some(Outstanding {
            command,
            deadline: now + self.config.response_timeout_duration(),
        });
    }

    fn on_value(&mut self, value: TelemetryValue, now: Instant) {
        self.vehicle.apply(&value);
        self.accumulator.on_value(&value);
        self.notify(SessionEvent::Telemetry { value });

        let cycle_len = match &self.state {
            SessionState::Polling(poll) => poll.queue.len(),
            _ => return,
        };
        if self
            .accumulator
            .should_flush(now, self.config.poll_interval_duration(), cycle_len)
        {
            self.flush_pending(now);
        }
    }

    fn flush_pending(&mut self, now: Instant) {
        if let Some(record) = self.accumulator.flush(now) {
            debug!("Flushing record {} with {} fields", record.id, record.populated_fields());
            self.notify(SessionEvent::RecordFlushed {
                id: record.id,
                fields: record.populated_fields(),
            });
            self.actions.push(Action::Persist(record));
        }
    }

    fn notify(&mut self, event: SessionEvent) {
        self.actions.push(Action::Notify(event));
    }
}
