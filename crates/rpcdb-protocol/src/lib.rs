//! # rpcdb Protocol
//!
//! Wire types for the rpcdb JSON-RPC database protocol.
//!
//! Every exchange on the connection is a single text frame holding one JSON
//! object:
//!
//! ```text
//! request   {"id":<int>,"method":"<name>","params":<json-array>}
//! success   {"id":<int>,"result":<any>}
//! failure   {"id":<int>,"error":{"message":<string>,...}}
//! ```
//!
//! `params` is omitted when a method takes none. The `query` method answers
//! with an ordered array of [`StatementOutcome`]s, one per statement.
//!
//! This crate only describes the data. Correlation, connection management and
//! error normalization live in `rpcdb-client`.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod batch;
mod envelope;

pub use batch::StatementOutcome;
pub use envelope::{RequestEnvelope, RequestId, ResponseEnvelope, ServerError};

/// Method name of the batched multi-statement query call.
pub const QUERY_METHOD: &str = "query";

/// Method name of the post-connect namespace/database scoping call.
pub const USE_METHOD: &str = "use";
