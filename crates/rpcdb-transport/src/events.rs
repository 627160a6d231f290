//! Transport event types.

use tokio::sync::mpsc;

/// Lifecycle and inbound-data events of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established and frames may be sent.
    Open,

    /// An inbound text frame.
    Message(String),

    /// The connection failed. No further events follow.
    Error(String),

    /// The connection was closed. No further events follow.
    Close(Option<String>),
}

impl TransportEvent {
    /// Returns `true` for events that end the connection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_) | Self::Close(_))
    }
}

/// An emitter for delivering `TransportEvent`s to the connection owner.
///
/// Delivery is unbounded: inbound frames must never be dropped, since each one
/// may complete a pending request.
#[derive(Debug, Clone)]
pub struct TransportEventEmitter {
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportEventEmitter {
    /// Creates a new event emitter and a corresponding receiver.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Emits an event. Returns `false` if the receiver is gone.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Emits an `Open` event.
    pub fn emit_open(&self) -> bool {
        self.emit(TransportEvent::Open)
    }

    /// Emits a `Message` event.
    pub fn emit_message(&self, text: String) -> bool {
        self.emit(TransportEvent::Message(text))
    }

    /// Emits an `Error` event.
    pub fn emit_error(&self, message: impl Into<String>) -> bool {
        self.emit(TransportEvent::Error(message.into()))
    }

    /// Emits a `Close` event.
    pub fn emit_close(&self, reason: Option<String>) -> bool {
        self.emit(TransportEvent::Close(reason))
    }

    /// Returns `true` once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_event_emitter() {
        let (emitter, mut receiver) = TransportEventEmitter::new();

        assert!(emitter.emit_open());
        assert!(emitter.emit_message("{}".to_string()));
        assert!(emitter.emit_close(Some("bye".to_string())));

        assert_eq!(receiver.recv().await, Some(TransportEvent::Open));
        assert_eq!(
            receiver.recv().await,
            Some(TransportEvent::Message("{}".to_string()))
        );
        let last = receiver.recv().await.unwrap();
        assert!(last.is_terminal());
    }

    #[test]
    fn test_emit_after_receiver_dropped() {
        let (emitter, receiver) = TransportEventEmitter::new();
        drop(receiver);
        assert!(emitter.is_closed());
        assert!(!emitter.emit_error("gone"));
    }
}
