//! # rpcdb Transport
//!
//! Duplex, message-based transports for the rpcdb driver.
//!
//! A transport owns exactly one connection to a remote endpoint. Opening one
//! through a [`Connector`] returns immediately with a [`Connection`]: a
//! [`Transport`] handle for outbound text frames, and a receiver of
//! [`TransportEvent`]s that reports the lifecycle of the connection and every
//! inbound text frame:
//!
//! ```text
//! Connector::open(endpoint)
//!     │
//!     ├── Transport        send(frame) / close()
//!     └── events           Open → Message* → (Error | Close)
//! ```
//!
//! An `Error` or `Close` event is always the last event of a connection.
//!
//! ## Implementations
//!
//! - [`WebSocketConnector`]: `ws://` and `wss://` endpoints via `tokio-tungstenite`
//! - [`MemoryConnector`]: an in-process pair for tests, where a [`MemoryServer`]
//!   plays the remote side

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod error;
mod events;
pub mod memory;
mod traits;
mod types;
pub mod websocket;

pub use error::{TransportError, TransportResult};
pub use events::{TransportEvent, TransportEventEmitter};
pub use memory::{MemoryConnector, MemoryPeer, MemoryServer};
pub use traits::{Connection, Connector, Transport};
pub use types::{SharedState, TransportState};
pub use websocket::{WebSocketConnector, WebSocketTransport};
