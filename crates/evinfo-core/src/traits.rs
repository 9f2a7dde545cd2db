//! Trait abstractions for the adapter link and record storage.
//!
//! This module provides the [`Transport`] trait that abstracts over real
//! adapter links and the mock adapter, and the [`RecordSink`] trait that
//! completed telemetry records are handed to.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

use evinfo_types::TelemetryRecord;

use crate::error::Result;

/// Notifications a transport delivers to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The link to the adapter is up.
    Connected,
    /// The link to the adapter is down.
    Disconnected,
    /// Bytes received from the adapter.
    Data(Bytes),
}

/// Write half of an adapter link.
///
/// Received bytes and connection changes flow the other way, as
/// [`TransportEvent`]s on a channel handed to the controller.
///
/// # Example
///
/// ```ignore
/// use evinfo_core::{Transport, Result};
///
/// async fn reset<T: Transport>(transport: &mut T) -> Result<()> {
///     transport.send(b"ATZ\r").await
/// }
/// ```
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the adapter.
    ///
    /// Returns once the bytes are handed to the link, not when the adapter
    /// replies.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;
}

/// Destination for completed telemetry records.
///
/// Saving is fire-and-forget: the session never waits for storage.
pub trait RecordSink: Send {
    /// Hand off a completed record.
    fn save(&mut self, record: TelemetryRecord);
}

impl RecordSink for mpsc::UnboundedSender<TelemetryRecord> {
    fn save(&mut self, record: TelemetryRecord) {
        if self.send(record).is_err() {
            warn!("Record sink closed, dropping record");
        }
    }
}

impl RecordSink for mpsc::Sender<TelemetryRecord> {
    fn save(&mut self, record: TelemetryRecord) {
        if let Err(e) = self.try_send(record) {
            warn!("Record sink unavailable, dropping record: {e}");
        }
    }
}

impl RecordSink for Vec<TelemetryRecord> {
    fn save(&mut self, record: TelemetryRecord) {
        self.push(record);
    }
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn save(&mut self, _record: TelemetryRecord) {}
}
