//! Core client handle
//!
//! `Client` is a cheap-to-clone `Arc` wrapper: every clone shares one
//! connection, one correlator and one diagnostic channel. The connection is
//! created lazily by the first call that needs it.

use std::fmt;
use std::sync::Arc;

use rpcdb_transport::{Connector, TransportError, WebSocketConnector};
use tokio::sync::broadcast;

use super::builder::ClientBuilder;
use super::config::ClientConfig;
use super::correlator::Correlator;
use super::session::{ConnectionState, SessionManager};
use crate::error::{Error, Result};
use crate::events::{ClientEvent, ClientEventEmitter};

/// Shared state behind every clone of a [`Client`].
pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) session: SessionManager,
    pub(crate) events: ClientEventEmitter,
}

/// A JSON-RPC database client multiplexing requests over one WebSocket.
///
/// Any number of tasks may issue requests concurrently through clones of the
/// same handle. Requests share one connection and are matched to their
/// responses by id, in whatever order the responses arrive.
///
/// ```rust,no_run
/// use rpcdb_client::{Client, ClientConfig, SessionScope};
///
/// # async fn example() -> rpcdb_client::Result<()> {
/// let mut config = ClientConfig::new("ws://127.0.0.1:8000/rpc");
/// config.session = Some(SessionScope::new("test", "app"));
///
/// let client = Client::new(config)?;
/// let people = client.query("SELECT * FROM person", None).await?;
/// let version = client.send("version", None).await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client that connects over WebSocket.
    ///
    /// No connection is made until the first request. The endpoint must be a
    /// `ws` or `wss` URL.
    pub fn new(config: ClientConfig) -> Result<Self> {
        WebSocketConnector::parse_endpoint(&config.endpoint).map_err(|e| match e {
            TransportError::ConfigurationError(reason) => Error::Configuration(reason),
            other => other.into(),
        })?;
        Self::with_connector(config, WebSocketConnector::new())
    }

    /// Creates a client that opens its connections through `connector`.
    pub fn with_connector<C>(config: ClientConfig, connector: C) -> Result<Self>
    where
        C: Connector + 'static,
    {
        Self::from_parts(config, Arc::new(connector))
    }

    pub(crate) fn from_parts(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Created client for {} (id ceiling {})",
            config.endpoint,
            config.id_ceiling
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                correlator: Arc::new(Correlator::new(config.id_ceiling)),
                session: SessionManager::new(),
                events: ClientEventEmitter::new(),
                connector,
                config,
            }),
        })
    }

    /// Returns a builder for a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Opens and sets up the connection now instead of on the first request.
    ///
    /// Does nothing if the connection is already open.
    pub async fn connect(&self) -> Result<()> {
        self.inner.ensure_ready().await.map(|_| ())
    }

    /// Closes the connection.
    ///
    /// Requests still waiting for a response fail with a transport error. The
    /// handle stays usable: the next request opens a new connection. Closing
    /// an already closed (or never opened) client is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.session.state()
    }

    /// Subscribes to diagnostic events.
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// Number of connections this client has created.
    pub fn connections_created(&self) -> u64 {
        self.inner.session.connections_created()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.config.endpoint)
            .field("state", &self.state())
            .field("pending_requests", &self.pending_requests())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpcdb_transport::memory;

    #[test]
    fn test_new_client_is_absent() {
        let (connector, _server) = memory::pair();
        let client = Client::with_connector(ClientConfig::default(), connector).unwrap();

        assert_eq!(client.state(), ConnectionState::Absent);
        assert_eq!(client.pending_requests(), 0);
        assert_eq!(client.connections_created(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (connector, _server) = memory::pair();
        let err = Client::with_connector(ClientConfig::new("::"), connector).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_websocket_client_needs_websocket_scheme() {
        let err = Client::new(ClientConfig::new("http://127.0.0.1:8000/rpc")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("\"http\""));

        assert!(Client::new(ClientConfig::new("wss://db.internal/rpc")).is_ok());

        // Other connectors decide for themselves what an endpoint means
        let (connector, _server) = memory::pair();
        assert!(Client::with_connector(ClientConfig::new("http://127.0.0.1/rpc"), connector).is_ok());
    }

    #[tokio::test]
    async fn test_close_before_connect_is_noop() {
        let (connector, _server) = memory::pair();
        let client = Client::with_connector(ClientConfig::default(), connector).unwrap();

        client.close().await.unwrap();
        assert_eq!(client.state(), ConnectionState::Absent);
    }
}
