//! Error types for evinfo-core.
//!
//! Very little in the poller is fallible from a caller's point of view:
//! transport drops, malformed responses and timeouts are all absorbed by the
//! session state machine and reported through logs and events. The errors
//! here cover the edges that do return `Result`: transports, configuration
//! and the controller handle.
//!
//! | Error Type | Raised by | Typical handling |
//! |------------|-----------|------------------|
//! | [`Error::NotConnected`] | transports | Wait for the next connection |
//! | [`Error::Io`] | TCP transport | Reconnect |
//! | [`Error::WriteFailed`] | transports | Session drops to idle on its own |
//! | [`Error::Timeout`] | connect | Retry later |
//! | [`Error::InvalidConfig`] | [`crate::SessionConfig`] | Fix configuration and restart |
//! | [`Error::Cancelled`] | controller handle | Session already shut down |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to an OBD-II adapter.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Operation attempted while the adapter link is down.
    #[error("Not connected to adapter")]
    NotConnected,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Writing a command to the adapter failed.
    #[error("Write of {command:?} failed: {reason}")]
    WriteFailed {
        /// The command being written, without the carriage return.
        command: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The session was shut down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a write failure for a command.
    pub fn write_failed(command: &[u8], reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            command: String::from_utf8_lossy(command).trim_end().to_string(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using evinfo-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
