//! Shared helpers for client integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rpcdb_client::{Client, ClientConfig, ClientEvent, MemoryConnector, MemoryServer};
use rpcdb_transport::MemoryPeer;
use serde_json::{Value, json};
use tokio::sync::broadcast;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client on an in-memory connector, plus the server side.
pub fn memory_client(config: ClientConfig) -> (Client, MemoryServer) {
    init_tracing();
    let (connector, server) = MemoryConnector::pair();
    let client = Client::with_connector(config, connector).unwrap();
    (client, server)
}

/// What a scripted server has seen.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    frames: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl Recorder {
    /// Every request frame received, across all connections, in order.
    pub fn frames(&self) -> Vec<Value> {
        self.frames.lock().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Accepts and opens every connection, answering each request frame with
/// `handler(request)`. A `null` answer means no reply.
pub fn spawn_responder<F>(mut server: MemoryServer, handler: F) -> Recorder
where
    F: Fn(&Value) -> Value + Send + Sync + 'static,
{
    let recorder = Recorder::default();
    let handler = Arc::new(handler);
    let seen = recorder.clone();

    tokio::spawn(async move {
        while let Some(mut peer) = server.accept().await {
            seen.connections.fetch_add(1, Ordering::SeqCst);
            peer.accept_open();

            let seen = seen.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                while let Some(text) = peer.recv_frame().await {
                    let request: Value = serde_json::from_str(&text).unwrap();
                    seen.frames.lock().push(request.clone());
                    let reply = handler(&request);
                    if !reply.is_null() {
                        peer.send_frame(reply.to_string());
                    }
                }
            });
        }
    });

    recorder
}

pub fn ok(request: &Value, result: Value) -> Value {
    json!({"id": request["id"], "result": result})
}

pub fn server_error(request: &Value, code: i64, message: &str) -> Value {
    json!({"id": request["id"], "error": {"code": code, "message": message}})
}

/// Receives the next request frame on `peer`.
pub async fn next_request(peer: &mut MemoryPeer) -> Value {
    let text = tokio::time::timeout(Duration::from_secs(5), peer.recv_frame())
        .await
        .expect("no request frame within 5s")
        .expect("client side dropped");
    serde_json::from_str(&text).unwrap()
}

/// Receives the next request frame on `peer` and answers it with `result`.
pub async fn answer_next(peer: &mut MemoryPeer, result: Value) -> Value {
    let request = next_request(peer).await;
    peer.send_frame(ok(&request, result).to_string());
    request
}

/// Waits for the first event matching `predicate`.
pub async fn wait_for_event<P>(events: &mut broadcast::Receiver<ClientEvent>, predicate: P) -> ClientEvent
where
    P: Fn(&ClientEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not observed within 5s")
}
