//! Mock adapter implementation for testing.
//!
//! This module provides a simulated ELM327 adapter that can be used for unit
//! testing and demo runs without a vehicle.
//!
//! The [`MockAdapter`] implements the [`Transport`] trait and answers each
//! command on its event channel the way a real adapter would: a banner for
//! `ATZ`, `OK` for other directives, a positive response for known requests
//! and `NO DATA` for everything else, each followed by the `>` prompt.
//!
//! # Features
//!
//! - **Failure injection**: Make writes fail
//! - **Latency simulation**: Delay replies to exercise response timeouts
//! - **Silent commands**: Never answer selected commands
//! - **Custom responses**: Override the payload for any command

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use evinfo_types::pid;

use crate::error::{Error, Result};
use crate::traits::{Transport, TransportEvent};

/// Banner printed after a reset.
pub const MOCK_BANNER: &str = "ELM327 v1.5";

/// Default event channel capacity.
const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Payloads of a parked car with a healthy pack, keyed by request.
fn default_payloads() -> HashMap<String, String> {
    [
        (pid::BATTERY_CURRENT, "0190"),
        (pid::PACK_VOLTAGE, "02BC"),
        (pid::VEHICLE_SPEED, "40"),
        (pid::STATE_OF_CHARGE, "CC"),
        (pid::STATE_OF_CHARGE_HD, "CCCC"),
        (pid::BATTERY_AVG_TEMP, "41"),
        (pid::BATTERY_MAX_TEMP, "43"),
        (pid::BATTERY_MIN_TEMP, "40"),
        (pid::BATTERY_COOLANT_TEMP, "3E"),
        (pid::HVAC_MEASURED_POWER, "01F4"),
        (pid::HVAC_COMMANDED_POWER, "0258"),
        (pid::AC_COMPRESSOR, "02"),
        (pid::BATTERY_CAPACITY, "1F40"),
        (pid::BATTERY_RESISTANCE, "00FA"),
        (pid::ODOMETER, "2710"),
        (pid::AMBIENT_TEMP, "3C"),
    ]
    .into_iter()
    .map(|(request, payload)| (request.to_string(), payload.to_string()))
    .collect()
}

struct Inner {
    events: mpsc::Sender<TransportEvent>,
    connected: AtomicBool,
    payloads: RwLock<HashMap<String, String>>,
    silent: RwLock<HashSet<String>>,
    sent: RwLock<Vec<String>>,
    send_count: AtomicU32,
    should_fail: AtomicBool,
    /// Simulated reply latency in milliseconds (0 = immediate).
    latency_ms: AtomicU64,
    jitter: AtomicBool,
}

/// A simulated ELM327 adapter.
///
/// Cloning is cheap; clones share the same state, so a test can keep one
/// handle for inspection while the controller owns another.
///
/// # Example
///
/// ```
/// use evinfo_core::{MockAdapter, Transport, TransportEvent};
///
/// #[tokio::main]
/// async fn main() {
///     let (mut adapter, mut events) = MockAdapter::new();
///     adapter.connect().await;
///     assert_eq!(events.recv().await, Some(TransportEvent::Connected));
///
///     adapter.send(b"ATE0\r").await.unwrap();
///     let Some(TransportEvent::Data(reply)) = events.recv().await else { panic!() };
///     assert_eq!(&reply[..], b"OK\r\r>");
/// }
/// ```
#[derive(Clone)]
pub struct MockAdapter {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAdapter")
            .field("connected", &self.inner.connected.load(Ordering::Relaxed))
            .field("send_count", &self.inner.send_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl MockAdapter {
    /// Create a mock adapter with default replies and its event channel.
    pub fn new() -> (Self, mpsc::Receiver<TransportEvent>) {
        MockAdapterBuilder::new().build()
    }

    /// Bring the link up and report it on the event channel.
    pub async fn connect(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
        let _ = self.inner.events.send(TransportEvent::Connected).await;
    }

    /// Take the link down and report it on the event channel.
    pub async fn disconnect(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        let _ = self.inner.events.send(TransportEvent::Disconnected).await;
    }

    /// Check if the link is up.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Every command written so far, without terminators.
    pub async fn sent_commands(&self) -> Vec<String> {
        self.inner.sent.read().await.clone()
    }

    /// Number of writes so far, including failed ones.
    pub fn send_count(&self) -> u32 {
        self.inner.send_count.load(Ordering::Relaxed)
    }

    /// Make subsequent writes fail.
    pub fn set_should_fail(&self, fail: bool) {
        self.inner.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Delay every reply by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::Relaxed);
    }

    /// Answer `command` with `payload` after the response prefix.
    ///
    /// For directives the payload replaces the whole reply.
    pub async fn set_payload(&self, command: &str, payload: &str) {
        self.inner
            .payloads
            .write()
            .await
            .insert(command.to_ascii_uppercase(), payload.to_string());
    }

    /// Never answer `command`.
    pub async fn silence(&self, command: &str) {
        self.inner
            .silent
            .write()
            .await
            .insert(command.to_ascii_uppercase());
    }

    /// Answer `command` again after [`MockAdapter::silence`].
    pub async fn unsilence(&self, command: &str) {
        self.inner
            .silent
            .write()
            .await
            .remove(&command.to_ascii_uppercase());
    }

    /// Push raw bytes onto the event channel as if the adapter sent them.
    pub async fn inject(&self, data: impl Into<Bytes>) {
        let _ = self.inner.events.send(TransportEvent::Data(data.into())).await;
    }

    async fn reply_for(&self, command: &str) -> String {
        let payloads = self.inner.payloads.read().await;

        if pid::is_directive(command) {
            if let Some(reply) = payloads.get(command) {
                return format!("{reply}\r\r>");
            }
            return if command == pid::AT_RESET {
                format!("\r\r{MOCK_BANNER}\r\r>")
            } else {
                "OK\r\r>".to_string()
            };
        }

        let (Some(prefix), Some(payload)) = (pid::response_prefix(command), payloads.get(command))
        else {
            return "NO DATA\r\r>".to_string();
        };

        let payload = if self.inner.jitter.load(Ordering::Relaxed) {
            jittered(command).unwrap_or_else(|| payload.clone())
        } else {
            payload.clone()
        };
        format!("{prefix}{payload}\r\r>")
    }
}

/// Random but plausible payloads for the fast-changing values.
fn jittered(command: &str) -> Option<String> {
    match command {
        // -20 A .. 120 A, in 1/20 A units
        pid::BATTERY_CURRENT => {
            let raw: i16 = rand::random_range(-400..2400);
            Some(format!("{:04X}", raw as u16))
        }
        // 340 V .. 360 V, in 1/2 V units
        pid::PACK_VOLTAGE => Some(format!("{:04X}", rand::random_range(680u16..720))),
        // 0 .. 110 km/h
        pid::VEHICLE_SPEED => Some(format!("{:02X}", rand::random_range(0u8..110))),
        _ => None,
    }
}

#[async_trait]
impl Transport for MockAdapter {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.send_count.fetch_add(1, Ordering::Relaxed);

        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if self.inner.should_fail.load(Ordering::SeqCst) {
            return Err(Error::write_failed(bytes, "mock write failure"));
        }

        let command = String::from_utf8_lossy(bytes).trim().to_ascii_uppercase();
        self.inner.sent.write().await.push(command.clone());

        if self.inner.silent.read().await.contains(&command) {
            debug!("Mock adapter ignoring {command}");
            return Ok(());
        }

        let reply = self.reply_for(&command).await;
        let latency = Duration::from_millis(self.inner.latency_ms.load(Ordering::Relaxed));
        let events = self.inner.events.clone();
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let _ = events.send(TransportEvent::Data(Bytes::from(reply))).await;
        });
        Ok(())
    }
}

/// Builder for creating mock adapters with custom settings.
#[derive(Debug, Clone)]
pub struct MockAdapterBuilder {
    payloads: HashMap<String, String>,
    silent: HashSet<String>,
    latency: Duration,
    jitter: bool,
    capacity: usize,
}

impl Default for MockAdapterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapterBuilder {
    /// Create a new builder with default replies.
    pub fn new() -> Self {
        Self {
            payloads: default_payloads(),
            silent: HashSet::new(),
            latency: Duration::ZERO,
            jitter: false,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Override the payload for a command.
    #[must_use]
    pub fn payload(mut self, command: &str, payload: &str) -> Self {
        self.payloads
            .insert(command.to_ascii_uppercase(), payload.to_string());
        self
    }

    /// Never answer a command.
    #[must_use]
    pub fn silent(mut self, command: &str) -> Self {
        self.silent.insert(command.to_ascii_uppercase());
        self
    }

    /// Delay every reply.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Randomize current, voltage and speed on every reply.
    #[must_use]
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Build the mock adapter and its event channel.
    pub fn build(self) -> (MockAdapter, mpsc::Receiver<TransportEvent>) {
        let (events, rx) = mpsc::channel(self.capacity);
        let adapter = MockAdapter {
            inner: Arc::new(Inner {
                events,
                connected: AtomicBool::new(false),
                payloads: RwLock::new(self.payloads),
                silent: RwLock::new(self.silent),
                sent: RwLock::new(Vec::new()),
                send_count: AtomicU32::new(0),
                should_fail: AtomicBool::new(false),
                latency_ms: AtomicU64::new(u64::try_from(self.latency.as_millis()).unwrap_or(u64::MAX)),
                jitter: AtomicBool::new(self.jitter),
            }),
        };
        (adapter, rx)
    }
}
