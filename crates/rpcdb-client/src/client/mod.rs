//! Client implementation
//!
//! - `core`: the `Client` handle and its shared state
//! - `session`: lazy connection setup, scoping and the per-connection reader
//! - `correlator`: request ids and the pending-request table
//! - `demux`: routing inbound frames to pending requests
//! - `dispatcher`: `send` and `request`
//! - `query`: batched queries and result normalization
//! - `config` / `builder`: construction

pub mod builder;
pub mod config;
pub mod core;
mod correlator;
mod demux;
mod dispatcher;
mod query;
pub mod session;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, DEFAULT_ENDPOINT, DEFAULT_ID_CEILING, SessionScope};
pub use self::core::Client;
pub use session::ConnectionState;
