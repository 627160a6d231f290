//! Client error types.

use std::time::Duration;

use rpcdb_protocol::ServerError;
use rpcdb_transport::TransportError;
use thiserror::Error;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the client.
///
/// Every error is scoped to the one call that triggered it. Nothing is retried
/// internally.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The connection could not be opened, or was lost while a setup or
    /// request was pending.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered the request with an error.
    #[error("Server error: {message}")]
    Server {
        /// Message reported by the server
        message: String,
        /// The complete error object of the response
        error: ServerError,
        /// The request envelope that was sent
        request: String,
    },

    /// One or more statements of a batched query failed.
    ///
    /// The message is every per-statement message, in statement order, joined
    /// with `;`.
    #[error("{}", .messages.join(";"))]
    Batch {
        /// Per-statement error messages, in statement order
        messages: Vec<String>,
        /// The request envelope that was sent
        request: String,
    },

    /// An inbound frame could not be parsed.
    #[error("Malformed frame: {reason}")]
    MalformedFrame {
        /// Parser error
        reason: String,
    },

    /// Every request id below the ceiling is held by a pending request.
    #[error("All {ceiling} request ids are in use by pending requests")]
    IdSpaceExhausted {
        /// The configured id ceiling
        ceiling: u64,
    },

    /// Caller supplied parameters are not valid JSON.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// A value could not be serialized or deserialized.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The server answered with a result of an unexpected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The client was configured with invalid parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No response arrived within the configured request timeout.
    #[error("Request {method} timed out after {timeout:?}")]
    Timeout {
        /// Method of the request that timed out
        method: String,
        /// The timeout duration that was exceeded
        timeout: Duration,
    },
}

impl Error {
    /// Returns the request envelope attached to server and batch errors.
    pub fn request(&self) -> Option<&str> {
        match self {
            Self::Server { request, .. } | Self::Batch { request, .. } => Some(request),
            _ => None,
        }
    }

    /// Returns `true` for transport failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` for errors reported by the server, including batch errors.
    pub fn is_server(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Batch { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_message_joins_statements() {
        let err = Error::Batch {
            messages: vec!["first failed".to_string(), "second failed".to_string()],
            request: r#"{"id":0,"method":"query"}"#.to_string(),
        };
        assert_eq!(err.to_string(), "first failed;second failed");
        assert_eq!(err.request(), Some(r#"{"id":0,"method":"query"}"#));
        assert!(err.is_server());
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = Error::from(TransportError::ConnectionLost("reset".to_string()));
        assert_eq!(err.to_string(), "Connection lost: reset");
        assert!(err.is_transport());
        assert_eq!(err.request(), None);
    }
}
