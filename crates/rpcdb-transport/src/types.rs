//! Core transport types.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Represents the current state of a transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// The connection attempt is in progress.
    Connecting,
    /// The transport is connected and ready to send/receive frames.
    Open,
    /// A close was requested and is in progress.
    Closing,
    /// The connection is gone, either closed or failed.
    Closed,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Transport state shared between a transport handle and its driver task.
#[derive(Debug, Clone)]
pub struct SharedState(Arc<Mutex<TransportState>>);

impl SharedState {
    /// Creates a shared state starting at `Connecting`.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(TransportState::Connecting)))
    }

    /// Returns the current state.
    pub fn get(&self) -> TransportState {
        *self.0.lock()
    }

    /// Replaces the current state.
    pub fn set(&self, state: TransportState) {
        *self.0.lock() = state;
    }

    /// Moves to `next` only if the current state is `from`.
    pub fn transition(&self, from: TransportState, next: TransportState) -> bool {
        let mut state = self.0.lock();
        if *state == from {
            *state = next;
            true
        } else {
            false
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
