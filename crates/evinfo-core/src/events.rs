//! Session event system for lifecycle and telemetry notifications.
//!
//! This module provides an event-based system for observing a polling
//! session: connection changes, phase transitions, decoded values, timeouts
//! and record flushes.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use evinfo_types::TelemetryValue;

use crate::catalog::Tier;
use crate::scheduler::Phase;

/// Events emitted by a polling session.
///
/// All events are serializable for logging, persistence, and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SessionEvent {
    /// The transport reported a connection.
    Connected,
    /// The session moved to a new phase.
    PhaseChanged { phase: Phase },
    /// An init command got no prompt in time and was skipped.
    InitTimeout { command: String },
    /// A value was decoded.
    Telemetry { value: TelemetryValue },
    /// A polling request got no reply in time.
    ResponseTimeout { command: String },
    /// A new command cycle was planned.
    CycleStarted {
        cycle: u64,
        tiers: Vec<Tier>,
        commands: usize,
    },
    /// A completed record was handed to the sink.
    RecordFlushed { id: Uuid, fields: usize },
    /// The session dropped back to idle.
    Disconnected { reason: DisconnectReason },
}

/// Reason for disconnection.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DisconnectReason {
    /// The transport reported the link down.
    TransportClosed,
    /// Writing a command failed.
    WriteFailed(String),
    /// The session was shut down by its owner.
    Shutdown,
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::TransportClosed => write!(f, "transport closed"),
            DisconnectReason::WriteFailed(reason) => write!(f, "write failed: {reason}"),
            DisconnectReason::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Sender for session events.
pub type EventSender = broadcast::Sender<SessionEvent>;

/// Receiver for session events.
pub type EventReceiver = broadcast::Receiver<SessionEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SessionEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
