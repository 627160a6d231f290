//! Client configuration types and utilities
//!
//! This module contains the configuration recognized when a client handle is
//! constructed, plus loading it from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use url::Url;

use crate::error::{Error, Result};

/// Default endpoint of a locally running server.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000/rpc";

/// Default request id ceiling: ids cycle through `0..1000`.
pub const DEFAULT_ID_CEILING: u64 = 1000;

/// Namespace and database a connection is scoped to after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionScope {
    /// Namespace name
    pub namespace: String,
    /// Database name
    pub database: String,
}

impl SessionScope {
    /// Creates a session scope.
    pub fn new(namespace: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            database: database.into(),
        }
    }

    /// Serialized parameters of the scoping call: `[namespace, database]`.
    pub(crate) fn params(&self) -> Result<Box<RawValue>> {
        Ok(serde_json::value::to_raw_value(&[
            &self.namespace,
            &self.database,
        ])?)
    }
}

/// Configuration of a client handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection target, e.g. `ws://127.0.0.1:8000/rpc`
    pub endpoint: String,

    /// Scope every new connection to this namespace/database
    pub session: Option<SessionScope>,

    /// Log connect/reconnect lines at `info` instead of `debug`
    pub verbose_logging: bool,

    /// Request ids cycle through `0..id_ceiling`
    pub id_ceiling: u64,

    /// Fail requests without a response after this many milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Fail connection attempts that do not open within this many milliseconds
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            session: None,
            verbose_logging: false,
            id_ceiling: DEFAULT_ID_CEILING,
            request_timeout_ms: None, // wait indefinitely
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for the given endpoint with defaults otherwise.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `RPCDB_ENDPOINT` | `endpoint` |
    /// | `RPCDB_NAMESPACE`, `RPCDB_DATABASE` | `session` (both or neither) |
    /// | `RPCDB_VERBOSE` | `verbose_logging` (`1`, `true`, `yes`, `on`) |
    /// | `RPCDB_REQUEST_TIMEOUT_MS` | `request_timeout_ms` |
    /// | `RPCDB_CONNECT_TIMEOUT_MS` | `connect_timeout_ms` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("RPCDB_ENDPOINT") {
            config.endpoint = endpoint;
        }

        config.session = match (lookup("RPCDB_NAMESPACE"), lookup("RPCDB_DATABASE")) {
            (Some(namespace), Some(database)) => Some(SessionScope::new(namespace, database)),
            (None, None) => None,
            _ => {
                return Err(Error::Configuration(
                    "RPCDB_NAMESPACE and RPCDB_DATABASE must be set together".to_string(),
                ));
            }
        };

        if let Some(verbose) = lookup("RPCDB_VERBOSE") {
            config.verbose_logging = matches!(
                verbose.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config.request_timeout_ms = parse_millis(&lookup, "RPCDB_REQUEST_TIMEOUT_MS")?;
        config.connect_timeout_ms = parse_millis(&lookup, "RPCDB_CONNECT_TIMEOUT_MS")?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for consistency.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.endpoint).map_err(|e| {
            Error::Configuration(format!("invalid endpoint {:?}: {e}", self.endpoint))
        })?;

        if self.id_ceiling == 0 {
            return Err(Error::Configuration(
                "id_ceiling must be at least 1".to_string(),
            ));
        }

        if let Some(scope) = &self.session
            && (scope.namespace.is_empty() || scope.database.is_empty())
        {
            return Err(Error::Configuration(
                "session namespace and database must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Connect timeout, if one is configured.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::Configuration(format!("{key}={value:?}: {e}")))
        })
        .transpose()
}
