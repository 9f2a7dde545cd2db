//! TCP transport for Wi-Fi ELM327 adapters.
//!
//! Wi-Fi adapters expose a raw byte stream on a fixed address. The reader
//! task splits that stream into replies at the `>` prompt, so each
//! [`TransportEvent::Data`] carries one complete reply including its prompt.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::traits::{Transport, TransportEvent};

/// Address most Wi-Fi ELM327 clones listen on.
pub const DEFAULT_ADAPTER_ADDRESS: &str = "192.168.0.10:35000";

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Unterminated data beyond this many bytes is forwarded as is.
const MAX_REPLY_LEN: usize = 4096;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A connected TCP link to an adapter.
#[derive(Debug)]
pub struct TcpTransport {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
    peer: String,
}

impl TcpTransport {
    /// Connect to an adapter and start reading from it.
    ///
    /// The returned channel has already received [`TransportEvent::Connected`]
    /// and receives [`TransportEvent::Disconnected`] when the peer goes away.
    pub async fn connect(
        address: &str,
        timeout: Duration,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| Error::timeout(format!("connect to {address}"), timeout))??;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| address.to_string());
        info!("Connected to adapter at {peer}");

        let (read_half, writer) = stream.into_split();
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        events
            .send(TransportEvent::Connected)
            .await
            .map_err(|_| Error::NotConnected)?;
        let reader = tokio::spawn(read_replies(read_half, events));

        Ok((
            Self {
                writer,
                reader,
                peer,
            },
            rx,
        ))
    }

    /// Address of the adapter.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| Error::write_failed(bytes, e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::write_failed(bytes, e.to_string()))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_replies(mut reader: OwnedReadHalf, events: mpsc::Sender<TransportEvent>) {
    let mut buf = BytesMut::with_capacity(256);
    loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("Adapter closed the connection");
                break;
            }
            Ok(_) => {
                while let Some(pos) = buf.iter().position(|b| *b == b'>') {
                    let reply = buf.split_to(pos + 1).freeze();
                    if events.send(TransportEvent::Data(reply)).await.is_err() {
                        return;
                    }
                }
                if buf.len() > MAX_REPLY_LEN {
                    warn!("No prompt after {} bytes, forwarding partial reply", buf.len());
                    let partial = buf.split().freeze();
                    if events.send(TransportEvent::Data(partial)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Adapter read failed: {e}");
                break;
            }
        }
    }
    let _ = events.send(TransportEvent::Disconnected).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_replies_framed_on_prompt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 5];
            socket.read_exact(&mut request).await.unwrap();
            socket.write_all(b"62 28").await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            socket.write_all(b" 85 01 4A\r\r>OK\r\r>").await.unwrap();
            request
        });

        let (mut transport, mut events) = TcpTransport::connect(&address, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(events.recv().await, Some(TransportEvent::Connected));

        transport.send(b"ATZ\r\n").await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Data("62 28 85 01 4A\r\r>".into()))
        );
        assert_eq!(events.recv().await, Some(TransportEvent::Data("OK\r\r>".into())));

        assert_eq!(&server.await.unwrap(), b"ATZ\r\n");
        assert_eq!(events.recv().await, Some(TransportEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpTransport::connect(&address, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
