//! Core transport traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportResult;
use crate::events::TransportEvent;
use crate::types::TransportState;

/// The outbound half of one duplex connection.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends a single text frame.
    ///
    /// Fails with `NotConnected` unless the transport is open.
    async fn send(&self, frame: String) -> TransportResult<()>;

    /// Requests shutdown of the connection.
    ///
    /// Closing an already closed transport is a no-op.
    async fn close(&self) -> TransportResult<()>;

    /// Returns the current state of the transport.
    fn state(&self) -> TransportState;

    /// Returns `true` if the transport is currently open.
    fn is_open(&self) -> bool {
        self.state() == TransportState::Open
    }

    /// Returns the endpoint address of this transport, if applicable.
    fn endpoint(&self) -> Option<String> {
        None
    }
}

/// Creates connections to a remote endpoint.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Starts a connection attempt.
    ///
    /// Returns as soon as the attempt is under way; the outcome is reported
    /// through the first event on [`Connection::events`] (`Open` on success,
    /// `Error` or `Close` on failure). An error here means the attempt could
    /// not even be started, e.g. because the endpoint is invalid.
    async fn open(&self, endpoint: &str) -> TransportResult<Connection>;
}

/// A connection under way: its transport handle and its event stream.
#[derive(Debug)]
pub struct Connection {
    /// Outbound half of the connection
    pub transport: Arc<dyn Transport>,
    /// Lifecycle events and inbound frames, in arrival order
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Connection {
    /// Creates a connection from its two halves.
    pub fn new(
        transport: Arc<dyn Transport>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { transport, events }
    }
}
