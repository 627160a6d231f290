//! Client diagnostic events.
//!
//! Failures that have no caller to return to (malformed frames, responses for
//! unknown ids, connection loss) are logged and also broadcast as
//! [`ClientEvent`]s so applications and tests can observe them.

use rpcdb_protocol::RequestId;
use tokio::sync::broadcast;

/// Capacity of the diagnostic broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Represents diagnostic events of a client handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection finished setup and is ready for requests.
    Connected {
        /// Endpoint of the connection
        endpoint: String,
        /// Per-handle connection number, starting at 1
        connection: u64,
    },

    /// A connection closed or failed.
    Disconnected {
        /// Per-handle connection number
        connection: u64,
        /// Why the connection ended
        reason: String,
        /// Pending requests that were failed because of it
        failed_requests: usize,
    },

    /// An inbound frame could not be parsed and was dropped.
    MalformedFrame {
        /// Per-handle connection number
        connection: u64,
        /// Parser error
        reason: String,
    },

    /// An inbound frame matched no pending request and was dropped.
    OrphanedResponse {
        /// Per-handle connection number
        connection: u64,
        /// The frame's id, if it carried a numeric one
        id: Option<RequestId>,
    },
}

/// Broadcasts `ClientEvent`s to any number of subscribers.
#[derive(Debug, Clone)]
pub(crate) struct ClientEventEmitter {
    sender: broadcast::Sender<ClientEvent>,
}

impl ClientEventEmitter {
    pub(crate) fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Emits an event. Events without subscribers are dropped.
    pub(crate) fn emit(&self, event: ClientEvent) {
        let _ = self.sender.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_reach_every_subscriber() {
        let emitter = ClientEventEmitter::new();
        let mut first = emitter.subscribe();
        let mut second = emitter.subscribe();

        emitter.emit(ClientEvent::OrphanedResponse {
            connection: 1,
            id: Some(RequestId(5)),
        });

        assert_eq!(first.recv().await.unwrap(), second.recv().await.unwrap());
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        ClientEventEmitter::new().emit(ClientEvent::MalformedFrame {
            connection: 1,
            reason: "eof".to_string(),
        });
    }
}
