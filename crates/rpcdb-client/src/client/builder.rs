//! Client builder pattern for client construction
//!
//! Provides a fluent interface for configuring client options before creation.

use std::sync::Arc;

use rpcdb_transport::Connector;

use super::config::{ClientConfig, SessionScope};
use super::core::Client;
use crate::error::Result;

/// Builder for configuring and creating clients
///
/// # Examples
///
/// ```rust,no_run
/// use rpcdb_client::ClientBuilder;
///
/// # fn example() -> rpcdb_client::Result<()> {
/// let client = ClientBuilder::new()
///     .with_endpoint("wss://db.example.com/rpc")
///     .with_session("test", "app")
///     .with_verbose_logging(true)
///     .with_request_timeout(30_000) // 30 seconds
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    /// Create a new client builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the connection target
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Scope every new connection to a namespace and database
    pub fn with_session(mut self, namespace: impl Into<String>, database: impl Into<String>) -> Self {
        self.config.session = Some(SessionScope::new(namespace, database));
        self
    }

    /// Log connection lifecycle lines at `info` instead of `debug`
    pub fn with_verbose_logging(mut self, enabled: bool) -> Self {
        self.config.verbose_logging = enabled;
        self
    }

    /// Set the request id ceiling
    ///
    /// # Arguments
    ///
    /// * `ceiling` - Ids cycle through `0..ceiling`
    pub fn with_id_ceiling(mut self, ceiling: u64) -> Self {
        self.config.id_ceiling = ceiling;
        self
    }

    /// Set request timeout in milliseconds
    pub fn with_request_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.request_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set connect timeout in milliseconds
    pub fn with_connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.connect_timeout_ms = Some(timeout_ms);
        self
    }

    /// Open connections through a custom connector instead of WebSocket
    pub fn with_connector<C>(mut self, connector: C) -> Self
    where
        C: Connector + 'static,
    {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Validate the configuration and create the client.
    ///
    /// No connection is made until the first request.
    pub fn build(self) -> Result<Client> {
        match self.connector {
            Some(connector) => Client::from_parts(self.config, connector),
            None => Client::new(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;
    use rpcdb_transport::memory;

    #[test]
    fn test_builder_sets_every_option() {
        let (connector, _server) = memory::pair();
        let client = ClientBuilder::new()
            .with_endpoint("ws://db.internal:8000/rpc")
            .with_session("ns", "db")
            .with_verbose_logging(true)
            .with_id_ceiling(16)
            .with_request_timeout(500)
            .with_connect_timeout(250)
            .with_connector(connector)
            .build()
            .unwrap();

        let config = client.config();
        assert_eq!(config.endpoint, "ws://db.internal:8000/rpc");
        assert_eq!(config.session, Some(SessionScope::new("ns", "db")));
        assert!(config.verbose_logging);
        assert_eq!(config.id_ceiling, 16);
        assert_eq!(config.request_timeout_ms, Some(500));
        assert_eq!(config.connect_timeout_ms, Some(250));
    }

    #[test]
    fn test_build_validates() {
        let err = ClientBuilder::new().with_id_ceiling(0).build().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_build_without_connector_needs_websocket_scheme() {
        let err = ClientBuilder::new()
            .with_endpoint("http://127.0.0.1:8000/rpc")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_default_builder_uses_default_endpoint() {
        let client = ClientBuilder::new().build().unwrap();
        assert_eq!(client.config().endpoint, crate::DEFAULT_ENDPOINT);
    }
}
