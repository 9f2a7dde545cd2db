//! OBD-II polling scheduler and response decoder for electric vehicles.
//!
//! This crate drives an ELM327-style adapter over a half-duplex, text-framed
//! link: it runs the adapter setup handshake, cycles through a tiered
//! schedule of diagnostic requests, decodes the replies into typed telemetry
//! and folds them into a live vehicle state and periodically flushed records.
//!
//! # Features
//!
//! - **Session state machine**: idle, initializing, settling and polling
//!   phases with deadline-based timeouts ([`Scheduler`])
//! - **Tiered polling**: fast, slow and trip command tiers with independent
//!   cadences ([`CommandCatalog`])
//! - **Response decoding**: service 0x22 and 0x01 replies to physical values
//!   ([`decoder`])
//! - **Derived metrics**: power, efficiency and trip distance
//!   ([`VehicleState`])
//! - **Batching**: one persisted record per polling cycle
//!   ([`BatchAccumulator`])
//! - **Async controller**: a tokio task with watch, broadcast and stream
//!   outputs ([`Controller`])
//! - **Transports**: TCP for Wi-Fi adapters and a simulated adapter for tests
//!
//! # Session lifecycle
//!
//! | Phase | Sends | Leaves on |
//! |-------|-------|-----------|
//! | Idle | nothing | transport connected |
//! | Initializing | `ATZ`, `ATD`, `ATE0`, `ATS0`, `ATAL`, `ATSP6` | last command answered or timed out |
//! | Settling | nothing | settle delay elapsed |
//! | Polling | one request per tick | transport disconnected |
//!
//! # Quick Start
//!
//! ```no_run
//! use evinfo_core::{CommandCatalog, Controller, SessionConfig, TcpTransport, TelemetryRecord};
//! use evinfo_core::tcp::{DEFAULT_ADAPTER_ADDRESS, DEFAULT_CONNECT_TIMEOUT};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (transport, events) =
//!         TcpTransport::connect(DEFAULT_ADAPTER_ADDRESS, DEFAULT_CONNECT_TIMEOUT).await?;
//!     let (records, mut saved) = mpsc::unbounded_channel::<TelemetryRecord>();
//!
//!     let controller = Controller::spawn(
//!         transport,
//!         events,
//!         records,
//!         SessionConfig::default(),
//!         CommandCatalog::default(),
//!     )?;
//!
//!     while let Some(record) = saved.recv().await {
//!         println!("SoC {:?}%, power {:.1} kW", record.soc, controller.snapshot().power);
//!     }
//!     Ok(())
//! }
//! ```

pub mod accumulator;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod error;
pub mod events;
pub mod mock;
pub mod scheduler;
pub mod state;
pub mod tcp;
pub mod traits;

pub use accumulator::BatchAccumulator;
pub use catalog::{Cadence, CommandCatalog, CommandQueue, Tier};
pub use config::{SessionConfig, ValidationError};
pub use controller::Controller;
pub use decoder::{Response, decode};
pub use error::{Error, Result};
pub use events::{DisconnectReason, EventDispatcher, EventReceiver, EventSender, SessionEvent};
pub use mock::{MockAdapter, MockAdapterBuilder};
pub use scheduler::{Action, Phase, Scheduler};
pub use state::VehicleState;
pub use tcp::TcpTransport;
pub use traits::{NullSink, RecordSink, Transport, TransportEvent};

// Re-export types for convenience
pub use evinfo_types::{ParseError, TelemetryRecord, TelemetryValue, pid};
