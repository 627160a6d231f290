//! # rpcdb Client
//!
//! Async driver for a JSON-RPC database server reachable over one persistent
//! WebSocket connection.
//!
//! ## Features
//!
//! - Lazy connection setup on first use, shared by concurrent first callers
//! - Optional namespace/database scoping of every new connection
//! - Request/response correlation over a single connection, any arrival order
//! - Batched multi-statement queries with aggregated statement errors
//! - Typed errors scoped to the call that caused them, no internal retries
//! - Diagnostic events for failures that have no caller to return to
//!
//! ## Architecture
//!
//! ```text
//! Client::send / request / query
//!        ↓
//! Session Manager ── ensure_ready(): connect, scope, mark open
//!        ↓
//! Correlator ── id allocation, pending table
//!        ↓                         ↑
//! Transport (rpcdb-transport) → reader task → demultiplexer
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rpcdb_client::ClientBuilder;
//! use serde_json::json;
//!
//! # async fn example() -> rpcdb_client::Result<()> {
//! let client = ClientBuilder::new()
//!     .with_endpoint("ws://127.0.0.1:8000/rpc")
//!     .with_session("test", "app")
//!     .build()?;
//!
//! // Raw call: params are JSON text, placed into the request verbatim
//! let person = client.send("select", Some(r#"["person:ada"]"#)).await?;
//!
//! // Batched query: one result per statement
//! let results = client
//!     .query("SELECT * FROM person WHERE age > $min; INFO FOR DB;", Some(json!({"min": 18})))
//!     .await?;
//! assert_eq!(results.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs through `tracing`. Connection lifecycle lines (connect,
//! reconnect, disconnect) are emitted at `debug`, or at `info` when
//! `verbose_logging` is set. Dropped frames are logged at `warn` (unknown id)
//! and `error` (unparseable).

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

/// Logs a connection lifecycle line at `info` when verbose, `debug` otherwise.
macro_rules! lifecycle {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            ::tracing::info!($($arg)+)
        } else {
            ::tracing::debug!($($arg)+)
        }
    };
}

pub mod client;
mod error;
mod events;

pub use client::{
    Client, ClientBuilder, ClientConfig, ConnectionState, DEFAULT_ENDPOINT, DEFAULT_ID_CEILING,
    SessionScope,
};
pub use error::{Error, Result};
pub use events::ClientEvent;

// Re-export the wire and transport types that appear in the public API
pub use rpcdb_protocol::{RequestId, ServerError, StatementOutcome};
pub use rpcdb_transport::{
    Connector, MemoryConnector, MemoryServer, TransportError, WebSocketConnector,
};
