//! Request correlation
//!
//! The correlator allocates request ids and keeps the table of pending
//! requests. Each pending entry owns a oneshot sender; the caller that
//! dispatched the request holds the matching receiver inside a [`Pending`].
//!
//! An entry is removed exactly once, by whichever of these happens first:
//!
//! - the demultiplexer delivers the matching response frame (`resolve`)
//! - the connection it was sent on is lost (`reject_connection`)
//! - the waiting caller is dropped (`Pending`'s drop guard)
//!
//! Ids cycle through `0..ceiling`. Allocation skips ids still held by a
//! pending entry, so a wrapped counter never hands out an id whose response is
//! still outstanding.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rpcdb_protocol::{RequestEnvelope, RequestId, ResponseEnvelope};
use serde_json::value::RawValue;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// What a pending request eventually receives.
pub(crate) type Completion = Result<ResponseEnvelope>;

#[derive(Debug)]
struct PendingEntry {
    /// Distinguishes this entry from a later one reusing the same id
    seq: u64,
    /// Connection the request was sent on
    connection: u64,
    tx: oneshot::Sender<Completion>,
}

#[derive(Debug, Default)]
struct CorrelatorState {
    next_id: u64,
    next_seq: u64,
    pending: HashMap<RequestId, PendingEntry>,
}

/// Request id allocator and pending-request table of one client handle.
#[derive(Debug)]
pub(crate) struct Correlator {
    ceiling: u64,
    state: Mutex<CorrelatorState>,
}

impl Correlator {
    pub(crate) fn new(ceiling: u64) -> Self {
        Self {
            ceiling: ceiling.max(1),
            state: Mutex::new(CorrelatorState::default()),
        }
    }

    /// Returns the next free request id without registering it.
    #[cfg(test)]
    pub(crate) fn allocate(&self) -> Result<RequestId> {
        let mut state = self.state.lock();
        self.allocate_locked(&mut state)
    }

    fn allocate_locked(&self, state: &mut CorrelatorState) -> Result<RequestId> {
        for _ in 0..self.ceiling {
            let id = RequestId(state.next_id);
            state.next_id = (state.next_id + 1) % self.ceiling;
            if !state.pending.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(Error::IdSpaceExhausted {
            ceiling: self.ceiling,
        })
    }

    /// Allocates an id, builds the request envelope and registers the pending
    /// entry, all under one lock.
    pub(crate) fn register(
        self: &Arc<Self>,
        connection: u64,
        method: &str,
        params: Option<&RawValue>,
    ) -> Result<Pending> {
        let mut state = self.state.lock();
        let id = self.allocate_locked(&mut state)?;
        let request = RequestEnvelope::new(id, method, params).to_text()?;

        let seq = state.next_seq;
        state.next_seq += 1;

        let (tx, rx) = oneshot::channel();
        state.pending.insert(
            id,
            PendingEntry {
                seq,
                connection,
                tx,
            },
        );
        drop(state);

        tracing::trace!("Registered pending request {} ({})", id, method);
        Ok(Pending {
            id,
            seq,
            request,
            rx,
            correlator: Arc::clone(self),
        })
    }

    /// Delivers a response to its pending entry and removes the entry.
    ///
    /// Returns `false` if no entry exists for `id`.
    pub(crate) fn resolve(&self, id: RequestId, response: ResponseEnvelope) -> bool {
        let entry = self.state.lock().pending.remove(&id);
        match entry {
            Some(entry) => {
                // The caller may have gone away; the entry is removed regardless
                if entry.tx.send(Ok(response)).is_err() {
                    tracing::debug!("Response for request {} arrived after its caller left", id);
                }
                true
            }
            None => false,
        }
    }

    /// Fails a pending entry and removes it.
    ///
    /// Returns `false` if no entry exists for `id`.
    pub(crate) fn reject(&self, id: RequestId, error: Error) -> bool {
        let entry = self.state.lock().pending.remove(&id);
        match entry {
            Some(entry) => {
                let _ = entry.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Fails every entry sent on `connection`. Returns how many were failed.
    pub(crate) fn reject_connection(&self, connection: u64, error: &Error) -> usize {
        let failed: Vec<(RequestId, PendingEntry)> = {
            let mut state = self.state.lock();
            let ids: Vec<RequestId> = state
                .pending
                .iter()
                .filter(|(_, entry)| entry.connection == connection)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.pending.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let count = failed.len();
        for (id, entry) in failed {
            tracing::debug!("Failing pending request {}: {}", id, error);
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    /// Removes the entry for `id` only if it is still the one numbered `seq`.
    fn cancel(&self, id: RequestId, seq: u64) {
        let mut state = self.state.lock();
        if state.pending.get(&id).is_some_and(|entry| entry.seq == seq) {
            state.pending.remove(&id);
            tracing::trace!("Cancelled pending request {}", id);
        }
    }

    /// Number of requests awaiting a response.
    pub(crate) fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Returns `true` if `id` has a pending entry.
    #[cfg(test)]
    pub(crate) fn is_pending(&self, id: RequestId) -> bool {
        self.state.lock().pending.contains_key(&id)
    }
}

/// Caller side of one pending request.
///
/// Dropping it before the response arrives removes the pending entry.
#[derive(Debug)]
pub(crate) struct Pending {
    id: RequestId,
    seq: u64,
    request: String,
    rx: oneshot::Receiver<Completion>,
    correlator: Arc<Correlator>,
}

impl Pending {
    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    /// The serialized request envelope.
    pub(crate) fn request(&self) -> &str {
        &self.request
    }

    /// Waits for the response or for the request to be failed.
    pub(crate) async fn wait(&mut self) -> Completion {
        match (&mut self.rx).await {
            Ok(completion) => completion,
            Err(_) => Err(Error::Transport(
                rpcdb_transport::TransportError::ConnectionLost(
                    "pending request dropped without a response".to_string(),
                ),
            )),
        }
    }
}

impl Drop for Pending {
    fn drop(&mut self) {
        self.correlator.cancel(self.id, self.seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rpcdb_protocol::ServerError;
    use rpcdb_transport::TransportError;
    use serde_json::json;

    #[test]
    fn test_allocation_starts_at_zero_and_wraps() {
        let correlator = Correlator::new(1000);
        let ids: Vec<u64> = (0..1001)
            .map(|_| correlator.allocate().unwrap().get())
            .collect();

        assert_eq!(ids[0], 0);
        assert_eq!(ids[1], 1);
        assert_eq!(ids[999], 999);
        assert_eq!(ids[1000], 0);
    }

    #[test]
    fn test_allocation_skips_pending_ids() {
        let correlator = Arc::new(Correlator::new(3));
        let first = correlator.register(1, "ping", None).unwrap();
        assert_eq!(first.id(), RequestId(0));

        assert_eq!(correlator.allocate().unwrap(), RequestId(1));
        assert_eq!(correlator.allocate().unwrap(), RequestId(2));
        // 0 is still pending, so the wrapped counter moves on to 1
        assert_eq!(correlator.allocate().unwrap(), RequestId(1));
    }

    #[test]
    fn test_exhausted_id_space() {
        let correlator = Arc::new(Correlator::new(2));
        let _a = correlator.register(1, "a", None).unwrap();
        let _b = correlator.register(1, "b", None).unwrap();

        let err = correlator.register(1, "c", None).unwrap_err();
        assert!(matches!(err, Error::IdSpaceExhausted { ceiling: 2 }));
    }

    #[test]
    fn test_register_builds_envelope() {
        let correlator = Arc::new(Correlator::new(1000));
        let params = RawValue::from_string(r#"["ns","db"]"#.to_string()).unwrap();
        let pending = correlator.register(1, "use", Some(&params)).unwrap();

        assert_eq!(pending.request(), r#"{"id":0,"method":"use","params":["ns","db"]}"#);
        assert!(correlator.is_pending(pending.id()));
    }

    #[tokio::test]
    async fn test_resolve_delivers_and_removes() {
        let correlator = Arc::new(Correlator::new(1000));
        let mut pending = correlator.register(1, "ping", None).unwrap();
        let id = pending.id();

        assert!(correlator.resolve(id, ResponseEnvelope::success(id, json!("pong"))));
        assert!(!correlator.is_pending(id));
        assert!(!correlator.resolve(id, ResponseEnvelope::success(id, json!("late"))));

        let response = pending.wait().await.unwrap();
        assert_eq!(response.result, Some(json!("pong")));
    }

    #[tokio::test]
    async fn test_resolve_after_caller_left_still_removes() {
        let correlator = Arc::new(Correlator::new(1000));
        let pending = correlator.register(1, "ping", None).unwrap();
        let id = pending.id();

        // Swap in a sender whose receiver is already gone
        {
            let mut state = correlator.state.lock();
            let entry = state.pending.remove(&id).unwrap();
            let (tx, _) = oneshot::channel();
            state.pending.insert(id, PendingEntry { tx, ..entry });
        }

        assert!(correlator.resolve(id, ResponseEnvelope::failure(id, ServerError::new("x"))));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let correlator = Arc::new(Correlator::new(1000));
        let mut pending = correlator.register(1, "ping", None).unwrap();

        assert!(correlator.reject(
            pending.id(),
            Error::Transport(TransportError::ConnectionLost("reset".to_string()))
        ));
        assert!(pending.wait().await.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_reject_connection_only_touches_that_connection() {
        let correlator = Arc::new(Correlator::new(1000));
        let mut old = correlator.register(1, "a", None).unwrap();
        let current = correlator.register(2, "b", None).unwrap();

        let error = Error::Transport(TransportError::ConnectionLost("closed".to_string()));
        assert_eq!(correlator.reject_connection(1, &error), 1);

        assert!(old.wait().await.is_err());
        assert!(correlator.is_pending(current.id()));
    }

    #[test]
    fn test_dropping_pending_removes_entry() {
        let correlator = Arc::new(Correlator::new(1000));
        let pending = correlator.register(1, "ping", None).unwrap();
        let id = pending.id();

        drop(pending);
        assert!(!correlator.is_pending(id));
    }

    #[test]
    fn test_stale_guard_does_not_remove_reused_id() {
        let correlator = Arc::new(Correlator::new(1));
        let first = correlator.register(1, "a", None).unwrap();
        let id = first.id();
        assert!(correlator.resolve(id, ResponseEnvelope::success(id, json!(null))));

        let second = correlator.register(1, "b", None).unwrap();
        assert_eq!(second.id(), id);

        drop(first);
        assert!(correlator.is_pending(id));
        drop(second);
        assert!(!correlator.is_pending(id));
    }
}
