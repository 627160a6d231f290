//! WebSocket transport.
//!
//! Each connection is run by one background driver task that owns the socket.
//! The driver is the single consumer of the WebSocket stream and the single
//! writer to its sink:
//!
//! ```text
//! WebSocketTransport::send ──► outbound channel ──┐
//!                                                 ▼
//!                                  driver task (tokio::spawn)
//!                                  loop { select! {
//!                                    outbound  => sink.send(Text)
//!                                    inbound   => emit Message / Close / Error
//!                                  } }
//! ```

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{TransportError, TransportResult};
use crate::events::TransportEventEmitter;
use crate::traits::{Connection, Connector, Transport};
use crate::types::{SharedState, TransportState};

/// Reason reported in the `Close` event when the client closes the socket.
const CLIENT_CLOSE_REASON: &str = "closed by client";

/// Commands from the transport handle to its driver task.
#[derive(Debug)]
enum Outbound {
    Frame(String, oneshot::Sender<TransportResult<()>>),
    Close,
}

/// Opens WebSocket connections to `ws://` or `wss://` endpoints.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a WebSocket connector.
    pub fn new() -> Self {
        Self
    }

    /// Validates that the endpoint is a WebSocket URL.
    pub fn parse_endpoint(endpoint: &str) -> TransportResult<Url> {
        let url = Url::parse(endpoint).map_err(|e| {
            TransportError::ConfigurationError(format!("invalid endpoint {endpoint:?}: {e}"))
        })?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            scheme => Err(TransportError::ConfigurationError(format!(
                "unsupported endpoint scheme {scheme:?}, expected ws or wss"
            ))),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, endpoint: &str) -> TransportResult<Connection> {
        let url = Self::parse_endpoint(endpoint)?;
        let (emitter, events) = TransportEventEmitter::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let state = SharedState::new();

        tokio::spawn(drive(url.to_string(), outbound_rx, emitter, state.clone()));

        let transport = WebSocketTransport {
            endpoint: url.to_string(),
            outbound: outbound_tx,
            state,
        };
        Ok(Connection::new(std::sync::Arc::new(transport), events))
    }
}

/// Outbound handle of one WebSocket connection.
#[derive(Debug)]
pub struct WebSocketTransport {
    endpoint: String,
    outbound: mpsc::UnboundedSender<Outbound>,
    state: SharedState,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, frame: String) -> TransportResult<()> {
        let state = self.state.get();
        if state != TransportState::Open {
            return Err(TransportError::NotConnected(state.to_string()));
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.outbound
            .send(Outbound::Frame(frame, ack_tx))
            .map_err(|_| TransportError::ConnectionLost("driver task has exited".to_string()))?;
        ack_rx
            .await
            .map_err(|_| TransportError::ConnectionLost("driver task has exited".to_string()))?
    }

    async fn close(&self) -> TransportResult<()> {
        match self.state.get() {
            TransportState::Closed | TransportState::Closing => Ok(()),
            _ => {
                self.state.set(TransportState::Closing);
                // The driver may already be gone, in which case there is nothing to close.
                let _ = self.outbound.send(Outbound::Close);
                Ok(())
            }
        }
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}

/// Driver task: connects, then pumps frames in both directions until the
/// connection ends. Always finishes by emitting exactly one terminal event.
async fn drive(
    endpoint: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: TransportEventEmitter,
    state: SharedState,
) {
    let socket = match connect_async(endpoint.as_str()).await {
        Ok((socket, _response)) => socket,
        Err(e) => {
            warn!("WebSocket connection to {} failed: {}", endpoint, e);
            state.set(TransportState::Closed);
            events.emit_error(e.to_string());
            return;
        }
    };

    // close() may have been called while the handshake was in flight
    if !state.transition(TransportState::Connecting, TransportState::Open) {
        debug!("WebSocket to {} closed before open completed", endpoint);
        let mut socket = socket;
        let _ = socket.close(None).await;
        state.set(TransportState::Closed);
        events.emit_close(Some(CLIENT_CLOSE_REASON.to_string()));
        return;
    }

    info!("WebSocket connected to {}", endpoint);
    events.emit_open();

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Frame(text, ack)) => {
                    trace!("Sending frame to {}: {}", endpoint, text);
                    let result = sink
                        .send(Message::Text(text.into()))
                        .await
                        .map_err(TransportError::from);
                    let failure = result.as_ref().err().cloned();
                    let _ = ack.send(result);
                    if let Some(e) = failure {
                        error!("WebSocket write to {} failed: {}", endpoint, e);
                        events.emit_error(e.to_string());
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("Closing WebSocket to {}", endpoint);
                    let _ = sink.close().await;
                    events.emit_close(Some(CLIENT_CLOSE_REASON.to_string()));
                    break;
                }
            },

            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received frame from {}: {}", endpoint, text.as_str());
                    events.emit_message(text.as_str().to_owned());
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => {
                        events.emit_message(text);
                    }
                    Err(e) => {
                        // Forwarded lossily so the frame still reaches the parser
                        warn!("Non UTF-8 binary frame from {}: {}", endpoint, e);
                        events.emit_message(String::from_utf8_lossy(e.as_bytes()).into_owned());
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.as_str().to_owned());
                    info!("WebSocket to {} closed by server: {:?}", endpoint, reason);
                    events.emit_close(reason);
                    break;
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite itself
                    trace!("Control frame from {}", endpoint);
                }
                Some(Err(e)) => {
                    error!("WebSocket error on {}: {}", endpoint, e);
                    events.emit_error(e.to_string());
                    break;
                }
                None => {
                    info!("WebSocket stream from {} ended", endpoint);
                    events.emit_close(None);
                    break;
                }
            },
        }
    }

    state.set(TransportState::Closed);
    debug!("WebSocket driver for {} terminated", endpoint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_accepts_ws_schemes() {
        assert!(WebSocketConnector::parse_endpoint("ws://localhost:8000/rpc").is_ok());
        assert!(WebSocketConnector::parse_endpoint("wss://db.example.com/rpc").is_ok());
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        let err = WebSocketConnector::parse_endpoint("http://localhost:8000").unwrap_err();
        assert!(matches!(err, TransportError::ConfigurationError(_)));
        assert!(WebSocketConnector::parse_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_error_event() {
        let connection = WebSocketConnector::new()
            .open("ws://127.0.0.1:1/rpc")
            .await
            .unwrap();
        let mut events = connection.events;

        let event = events.recv().await.unwrap();
        assert!(event.is_terminal());
        assert_eq!(connection.transport.state(), TransportState::Closed);
    }

    #[tokio::test]
    async fn test_send_before_open_is_rejected() {
        let connection = WebSocketConnector::new()
            .open("ws://127.0.0.1:1/rpc")
            .await
            .unwrap();
        let result = connection.transport.send("{}".to_string()).await;
        assert!(matches!(result, Err(TransportError::NotConnected(_))));
    }
}
