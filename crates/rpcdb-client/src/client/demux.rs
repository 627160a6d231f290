//! Inbound frame demultiplexing
//!
//! Every inbound text frame of a connection passes through [`route_frame`],
//! called from that connection's reader task. A frame is parsed, its id looked
//! up in the correlator, and the response handed to the waiting request.
//!
//! Any JSON object is a routable frame, whatever shape its `error` member
//! has, so a caller whose id came back always gets an answer.
//!
//! Frames that match nothing (late responses for requests that were already
//! failed or cancelled, server push messages) are dropped. Frames that do not
//! parse are dropped too; with no id to recover, no pending request is
//! affected and the connection stays up.

use rpcdb_protocol::{RequestId, ResponseEnvelope};

use super::correlator::Correlator;
use crate::error::{Error, Result};

/// Where an inbound frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Routed {
    /// Handed to the pending request with this id
    Delivered(RequestId),
    /// No pending request matched
    Orphaned(Option<RequestId>),
}

/// Parses one inbound frame and delivers it to its pending request.
pub(crate) fn route_frame(text: &str, correlator: &Correlator) -> Result<Routed> {
    let response = ResponseEnvelope::parse(text).map_err(|e| Error::MalformedFrame {
        reason: e.to_string(),
    })?;

    let Some(id) = response.request_id() else {
        return Ok(Routed::Orphaned(None));
    };

    if correlator.resolve(id, response) {
        tracing::trace!("Routed response to request {}", id);
        Ok(Routed::Delivered(id))
    } else {
        Ok(Routed::Orphaned(Some(id)))
    }
}
