//! Connector Errors
//!
//! Error taxonomy for connection establishment and session traffic.

use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Result alias used throughout the connector
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Errors produced by the connector
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Every connection attempt failed
    #[error("connection to {address} exhausted after {attempts} attempt(s): {last}")]
    ConnectionExhausted {
        address: String,
        attempts: u32,
        #[source]
        last: Box<ConnectorError>,
    },

    /// No open channel to transmit on
    #[error("not connected")]
    NotConnected,

    /// A received payload could not be decoded
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A single attempt exceeded its time budget
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The address is not a usable WebSocket URL
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// Connector settings are out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Underlying WebSocket failure
    #[error("transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Outgoing payload could not be serialized
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The connect cycle was cancelled by `disconnect`
    #[error("connect aborted by disconnect")]
    Aborted,
}

impl ConnectorError {
    /// Whether this error counts as a failed attempt eligible for retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Transport(_) | ConnectorError::Timeout(_))
    }

    /// The last underlying error for an exhausted connect, if any
    pub fn last_error(&self) -> Option<&ConnectorError> {
        match self {
            ConnectorError::ConnectionExhausted { last, .. } => Some(last),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_carries_last_error() {
        let err = ConnectorError::ConnectionExhausted {
            address: "ws://localhost:1".to_string(),
            attempts: 3,
            last: Box::new(ConnectorError::Timeout(Duration::from_secs(10))),
        };

        assert!(matches!(err.last_error(), Some(ConnectorError::Timeout(_))));
        let text = err.to_string();
        assert!(text.contains("3 attempt(s)"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ConnectorError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(!ConnectorError::NotConnected.is_retryable());
        assert!(!ConnectorError::Aborted.is_retryable());
    }
}
