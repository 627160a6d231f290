//! Transport error types.

use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Represents errors that can occur during transport operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Failed to send a message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The transport is not open.
    #[error("Transport is not connected (state: {0})")]
    NotConnected(String),

    /// Connection establishment timed out.
    #[error("Connection to {endpoint} timed out after {timeout:?}")]
    ConnectionTimeout {
        /// The endpoint being connected to
        endpoint: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },

    /// The transport was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::ConnectionLost(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::ConnectionLost(err.to_string())
            }
            WsError::Url(_) => Self::ConfigurationError(err.to_string()),
            other => Self::SendFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_endpoint() {
        let err = TransportError::ConnectionTimeout {
            endpoint: "ws://db:8000/rpc".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(
            err.to_string(),
            "Connection to ws://db:8000/rpc timed out after 5s"
        );
    }

    #[test]
    fn test_closed_socket_maps_to_connection_lost() {
        let err = TransportError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, TransportError::ConnectionLost(_)));
    }
}
