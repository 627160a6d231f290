//! In-memory transport for tests.
//!
//! [`MemoryConnector`] hands every connection it opens to a paired
//! [`MemoryServer`]. The server side of each connection is a [`MemoryPeer`],
//! which decides when the connection opens, reads the client's frames and
//! scripts the responses:
//!
//! ```rust,ignore
//! let (connector, mut server) = rpcdb_transport::memory::pair();
//! tokio::spawn(async move {
//!     while let Some(mut peer) = server.accept().await {
//!         peer.accept_open();
//!         while let Some(frame) = peer.recv_frame().await {
//!             peer.send_frame(reply_to(&frame));
//!         }
//!     }
//! });
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{TransportError, TransportResult};
use crate::events::TransportEventEmitter;
use crate::traits::{Connection, Connector, Transport};
use crate::types::{SharedState, TransportState};

/// Creates a connected connector/server pair.
pub fn pair() -> (MemoryConnector, MemoryServer) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    let opened = Arc::new(AtomicUsize::new(0));
    (
        MemoryConnector {
            accept: accept_tx,
            opened: opened.clone(),
        },
        MemoryServer {
            accept: accept_rx,
            opened,
        },
    )
}

/// Client side: opens in-memory connections.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    accept: mpsc::UnboundedSender<MemoryPeer>,
    opened: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Creates a connected connector/server pair.
    pub fn pair() -> (Self, MemoryServer) {
        pair()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open(&self, endpoint: &str) -> TransportResult<Connection> {
        let (emitter, events) = TransportEventEmitter::new();
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let state = SharedState::new();

        let peer = MemoryPeer {
            endpoint: endpoint.to_string(),
            frames: frames_rx,
            events: emitter.clone(),
            state: state.clone(),
        };
        self.accept.send(peer).map_err(|_| {
            TransportError::ConnectionFailed(format!("no server listening on {endpoint}"))
        })?;
        let count = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Opened in-memory connection #{} to {}", count, endpoint);

        let transport = MemoryTransport {
            endpoint: endpoint.to_string(),
            frames: frames_tx,
            events: emitter,
            state,
        };
        Ok(Connection::new(Arc::new(transport), events))
    }
}

/// Client side outbound handle of one in-memory connection.
#[derive(Debug)]
pub struct MemoryTransport {
    endpoint: String,
    frames: mpsc::UnboundedSender<String>,
    events: TransportEventEmitter,
    state: SharedState,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> TransportResult<()> {
        let state = self.state.get();
        if state != TransportState::Open {
            return Err(TransportError::NotConnected(state.to_string()));
        }
        self.frames
            .send(frame)
            .map_err(|_| TransportError::ConnectionLost("server side dropped".to_string()))
    }

    async fn close(&self) -> TransportResult<()> {
        let previous = self.state.get();
        if previous == TransportState::Closed {
            return Ok(());
        }
        self.state.set(TransportState::Closed);
        self.events.emit_close(Some("closed by client".to_string()));
        Ok(())
    }

    fn state(&self) -> TransportState {
        self.state.get()
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}

/// Server side: receives every connection opened by the paired connector.
#[derive(Debug)]
pub struct MemoryServer {
    accept: mpsc::UnboundedReceiver<MemoryPeer>,
    opened: Arc<AtomicUsize>,
}

impl MemoryServer {
    /// Waits for the next connection attempt.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept.recv().await
    }

    /// Returns the number of connections opened so far.
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

/// Server side of one in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    endpoint: String,
    frames: mpsc::UnboundedReceiver<String>,
    events: TransportEventEmitter,
    state: SharedState,
}

impl MemoryPeer {
    /// Returns the endpoint the client connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Completes the connection attempt.
    pub fn accept_open(&self) {
        if self
            .state
            .transition(TransportState::Connecting, TransportState::Open)
        {
            self.events.emit_open();
        }
    }

    /// Waits for the next frame sent by the client.
    ///
    /// Returns `None` once the client transport is dropped.
    pub async fn recv_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Delivers a text frame to the client.
    pub fn send_frame(&self, text: impl Into<String>) -> bool {
        self.events.emit_message(text.into())
    }

    /// Fails the connection with a transport error.
    pub fn fail(&self, message: impl Into<String>) {
        self.state.set(TransportState::Closed);
        self.events.emit_error(message);
    }

    /// Closes the connection from the server side.
    pub fn close(&self, reason: Option<String>) {
        self.state.set(TransportState::Closed);
        self.events.emit_close(reason);
    }

    /// Returns the current state of the connection.
    pub fn state(&self) -> TransportState {
        self.state.get()
    }
}
