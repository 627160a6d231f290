//! Session management
//!
//! The session manager owns the handle's current connection (its [`Link`]) and
//! brings one up on demand:
//!
//! ```text
//!            ensure_ready()                 open event
//! Absent ─────────────────► Connecting ─────────────────► Open
//!    ▲                           │  (scoping call, if any)   │
//!    │   error/close before open │                           │ error/close
//!    └───────────────────────────┘                           ▼
//!                                    next ensure_ready() ◄─ Closed
//! ```
//!
//! Setup is serialized by an async lock, so any number of concurrent first
//! calls produce exactly one connection attempt. A connection only becomes
//! `Open` after the scoping call (when configured) has completed, so no
//! caller-issued request can reach the wire ahead of it.
//!
//! Each connection gets one reader task, the sole consumer of that
//! connection's transport events. It routes inbound frames through the
//! demultiplexer and, when the connection ends, fails every request still
//! pending on it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rpcdb_protocol::USE_METHOD;
use rpcdb_transport::{Connection, Transport, TransportError, TransportEvent};
use tokio::sync::{mpsc, oneshot};

use super::core::ClientInner;
use super::correlator::Correlator;
use super::demux::{self, Routed};
use crate::error::{Error, Result};
use crate::events::{ClientEvent, ClientEventEmitter};

/// Connection state of a client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection has been created, or the last attempt failed.
    Absent,
    /// A connection attempt or session setup is in progress.
    Connecting,
    /// The connection is ready for requests.
    Open,
    /// The connection was closed or lost; the next call reconnects.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

type SharedConnectionState = Arc<Mutex<ConnectionState>>;

/// One connection instance of a client handle.
#[derive(Debug)]
pub(crate) struct Link {
    /// Per-handle connection number, starting at 1
    pub(crate) connection: u64,
    pub(crate) transport: Arc<dyn Transport>,
    state: SharedConnectionState,
}

impl Link {
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Connecting → Open. Fails if the connection was closed meanwhile.
    fn mark_open(&self) -> bool {
        let mut state = self.state.lock();
        if *state == ConnectionState::Connecting {
            *state = ConnectionState::Open;
            true
        } else {
            false
        }
    }

    /// Returns `true` if the link was not already closed.
    fn mark_closed(&self) -> bool {
        let mut state = self.state.lock();
        let changed = *state != ConnectionState::Closed;
        *state = ConnectionState::Closed;
        changed
    }
}

/// Current connection slot plus the setup lock.
#[derive(Debug, Default)]
pub(crate) struct SessionManager {
    current: Mutex<Option<Arc<Link>>>,
    setup: tokio::sync::Mutex<()>,
    connections: AtomicU64,
}

impl SessionManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Option<Arc<Link>> {
        self.current.lock().clone()
    }

    fn open_link(&self) -> Option<Arc<Link>> {
        self.current().filter(|link| link.is_open())
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.current()
            .map_or(ConnectionState::Absent, |link| link.state())
    }

    /// Number of connections created so far.
    pub(crate) fn connections_created(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }
}

impl ClientInner {
    /// Returns the open connection, creating and setting one up if needed.
    pub(crate) async fn ensure_ready(&self) -> Result<Arc<Link>> {
        if let Some(link) = self.session.open_link() {
            return Ok(link);
        }

        let _setup = self.session.setup.lock().await;

        // Another caller may have finished setup while this one waited
        if let Some(link) = self.session.open_link() {
            return Ok(link);
        }

        let stale = self.session.current.lock().take();
        if let Some(stale) = stale {
            lifecycle!(
                self.config.verbose_logging,
                "Reconnecting to {} (connection #{} is {})",
                self.config.endpoint,
                stale.connection,
                stale.state()
            );
            stale.mark_closed();
            let _ = stale.transport.close().await;
        }

        self.establish().await
    }

    async fn establish(&self) -> Result<Arc<Link>> {
        let scope_params = self
            .config
            .session
            .as_ref()
            .map(|scope| scope.params())
            .transpose()?;

        let endpoint = &self.config.endpoint;
        lifecycle!(self.config.verbose_logging, "Connecting to {}", endpoint);

        let Connection { transport, events } = self.connector.open(endpoint).await?;
        // Only attempts that produced a transport are numbered
        let connection = self.session.connections.fetch_add(1, Ordering::SeqCst) + 1;
        let state = Arc::new(Mutex::new(ConnectionState::Connecting));
        let link = Arc::new(Link {
            connection,
            transport,
            state: state.clone(),
        });
        *self.session.current.lock() = Some(link.clone());

        let (opened_tx, opened_rx) = oneshot::channel();
        let reader = Reader {
            connection,
            endpoint: endpoint.clone(),
            verbose: self.config.verbose_logging,
            state,
            correlator: self.correlator.clone(),
            events: self.events.clone(),
        };
        tokio::spawn(reader.run(events, opened_tx));

        if let Err(e) = self.await_open(opened_rx).await {
            self.abandon(&link).await;
            return Err(e);
        }

        if let (Some(scope), Some(params)) = (&self.config.session, &scope_params) {
            tracing::debug!(
                "Scoping connection #{} to namespace {:?}, database {:?}",
                connection,
                scope.namespace,
                scope.database
            );
            if let Err(e) = self.dispatch_on(&link, USE_METHOD, Some(params)).await {
                tracing::warn!("Session setup on connection #{} failed: {}", connection, e);
                self.abandon(&link).await;
                return Err(e);
            }
        }

        if !link.mark_open() {
            self.abandon(&link).await;
            return Err(TransportError::ConnectionLost(
                "connection closed during session setup".to_string(),
            )
            .into());
        }

        lifecycle!(
            self.config.verbose_logging,
            "Connected to {} (connection #{})",
            endpoint,
            connection
        );
        self.events.emit(ClientEvent::Connected {
            endpoint: endpoint.clone(),
            connection,
        });
        Ok(link)
    }

    async fn await_open(&self, opened: oneshot::Receiver<Result<()>>) -> Result<()> {
        let outcome = match self.config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, opened).await.map_err(|_| {
                TransportError::ConnectionTimeout {
                    endpoint: self.config.endpoint.clone(),
                    timeout,
                }
            })?,
            None => opened.await,
        };

        outcome.unwrap_or_else(|_| {
            Err(TransportError::ConnectionFailed(
                "connection task ended before open".to_string(),
            )
            .into())
        })
    }

    /// Tears down a connection whose setup failed.
    async fn abandon(&self, link: &Arc<Link>) {
        {
            let mut current = self.session.current.lock();
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, link)) {
                *current = None;
            }
        }
        link.mark_closed();
        let _ = link.transport.close().await;
    }

    /// Closes the current connection, if any.
    pub(crate) async fn close(&self) -> Result<()> {
        let Some(link) = self.session.current() else {
            return Ok(());
        };

        if link.mark_closed() {
            lifecycle!(
                self.config.verbose_logging,
                "Closing connection #{} to {}",
                link.connection,
                self.config.endpoint
            );
        }
        // Pending requests fail even if the transport cannot close cleanly
        let error = Error::Transport(TransportError::ConnectionLost(
            "connection closed by client".to_string(),
        ));
        self.correlator.reject_connection(link.connection, &error);

        link.transport.close().await?;
        Ok(())
    }
}

/// Per-connection reader task state.
struct Reader {
    connection: u64,
    endpoint: String,
    verbose: bool,
    state: SharedConnectionState,
    correlator: Arc<Correlator>,
    events: ClientEventEmitter,
}

impl Reader {
    async fn run(
        self,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        opened: oneshot::Sender<Result<()>>,
    ) {
        let mut opened = Some(opened);

        let reason = loop {
            match transport_events.recv().await {
                Some(TransportEvent::Open) => {
                    tracing::trace!("Connection #{} reported open", self.connection);
                    if let Some(tx) = opened.take() {
                        let _ = tx.send(Ok(()));
                    }
                }
                Some(TransportEvent::Message(text)) => self.route(&text),
                Some(TransportEvent::Error(message)) => break message,
                Some(TransportEvent::Close(reason)) => {
                    break reason.map_or_else(
                        || "connection closed".to_string(),
                        |reason| format!("connection closed: {reason}"),
                    );
                }
                None => break "transport event stream ended".to_string(),
            }
        };

        *self.state.lock() = ConnectionState::Closed;

        let error = Error::Transport(match opened {
            Some(_) => TransportError::ConnectionFailed(reason.clone()),
            None => TransportError::ConnectionLost(reason.clone()),
        });
        if let Some(tx) = opened.take() {
            let _ = tx.send(Err(error.clone()));
        }

        let failed_requests = self.correlator.reject_connection(self.connection, &error);
        lifecycle!(
            self.verbose,
            "Connection #{} to {} ended: {} ({} pending requests failed)",
            self.connection,
            self.endpoint,
            reason,
            failed_requests
        );
        self.events.emit(ClientEvent::Disconnected {
            connection: self.connection,
            reason,
            failed_requests,
        });
    }

    fn route(&self, text: &str) {
        match demux::route_frame(text, &self.correlator) {
            Ok(Routed::Delivered(_)) => {}
            Ok(Routed::Orphaned(id)) => {
                tracing::warn!(
                    "Dropping response for unknown request id {:?} on connection #{}",
                    id,
                    self.connection
                );
                self.events.emit(ClientEvent::OrphanedResponse {
                    connection: self.connection,
                    id,
                });
            }
            Err(e) => {
                tracing::error!(
                    "Dropping inbound frame on connection #{}: {}",
                    self.connection,
                    e
                );
                let reason = match e {
                    Error::MalformedFrame { reason } => reason,
                    other => other.to_string(),
                };
                self.events.emit(ClientEvent::MalformedFrame {
                    connection: self.connection,
                    reason,
                });
            }
        }
    }
}
