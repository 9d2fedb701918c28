//! Error handling for Machgate
//!
//! Provides the error types shared across the workspace:
//! - Transport errors (open/send/line-config failures reported by the link)
//! - Store errors (configuration persistence)
//! - The unified `Error` returned by the manager facade
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Transport capability error type
///
/// Reported by the physical link implementation for open, send, and
/// line-configuration failures. Open and send failures are retried
/// internally by the manager and never surfaced per-command.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// No attached device matched the open filter
    #[error("no device matched the open filter")]
    NoDevice,

    /// A matching device was found but could not be opened
    #[error("failed to open {port}: {reason}")]
    OpenFailed {
        /// The device path that failed to open.
        port: String,
        /// The reason the open failed.
        reason: String,
    },

    /// The device rejected the requested line configuration
    #[error("line configuration rejected: {reason}")]
    ConfigRejected {
        /// The reason the configuration was rejected.
        reason: String,
    },

    /// A send attempt failed before completing
    #[error("send failed: {reason}")]
    SendFailed {
        /// The reason the send failed.
        reason: String,
    },

    /// A send attempt exceeded its bounded timeout
    #[error("send timed out after {timeout_ms}ms")]
    SendTimeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// The link is closed; no device is currently open
    #[error("link is closed")]
    Closed,
}

/// Configuration store error type
///
/// Reported by `ConfigStore` implementations. Store failures during a
/// reconfiguration abort the operation before any state changes.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The settings document could not be loaded.
    #[error("failed to load settings: {0}")]
    Load(String),

    /// The settings document could not be saved.
    #[error("failed to save settings: {0}")]
    Save(String),

    /// I/O error during store operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main error type for the manager facade
///
/// A unified error type covering caller mistakes, capacity limits,
/// lifecycle misuse, and wrapped capability failures. This is the primary
/// error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input (empty/oversized command, zero baud rate)
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected.
        reason: String,
    },

    /// A bounded queue or stream has no space left
    #[error("{what} is full")]
    ResourceExhausted {
        /// The resource that is out of space.
        what: &'static str,
    },

    /// The manager was called before `start`
    #[error("machine manager not started")]
    NotInitialized,

    /// A bounded wait exceeded its deadline
    #[error("timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Resume was called while transmission was not paused
    #[error("transmission is not paused")]
    AlreadyResumed,

    /// Transport capability error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Configuration store error
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl Error {
    /// Create an `InvalidArgument` error from a reason string
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Error::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Transport(TransportError::SendTimeout { .. })
        )
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a persistence error
    pub fn is_persistence_error(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_argument("command is empty");
        assert_eq!(err.to_string(), "invalid argument: command is empty");

        let err = Error::ResourceExhausted {
            what: "command queue",
        };
        assert_eq!(err.to_string(), "command queue is full");

        let err = Error::Timeout { timeout_ms: 1000 };
        assert_eq!(err.to_string(), "timed out after 1000ms");
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: Error = TransportError::Closed.into();
        assert!(err.is_transport_error());
        assert_eq!(err.to_string(), "link is closed");

        let err: Error = TransportError::SendTimeout { timeout_ms: 500 }.into();
        assert!(err.is_timeout());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: Error = StoreError::Save("disk full".to_string()).into();
        assert!(err.is_persistence_error());
        assert_eq!(err.to_string(), "failed to save settings: disk full");
    }
}
