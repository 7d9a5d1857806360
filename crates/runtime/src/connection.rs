//! The BiDi demux loop (SPEC_FULL.md §4.1): one reader task classifies each
//! incoming frame as a response (routed to its waiter by id) or an event
//! (fanned out to subscribers), via the same `Connection`/`CancelGuard`
//! split used for the equivalent demux problem elsewhere in this codebase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, trace, warn};
use vibium_protocol::bidi::{BidiCommand, BidiMessage};

use crate::error::{Error, Result};
use crate::transport::{self, TransportReceiver, TransportSender};

const EVENT_BUS_CAPACITY: usize = 4096;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type PendingTable = Arc<DashMap<u64, oneshot::Sender<Result<Value>>>>;

/// Owns the duplex WebSocket to the browser. Cloning shares the same
/// underlying connection — every clone can call `send`/`subscribe`.
#[derive(Clone)]
pub struct Connection {
    last_id: Arc<AtomicU64>,
    pending: PendingTable,
    outbound_tx: mpsc::UnboundedSender<String>,
    events_tx: broadcast::Sender<vibium_protocol::bidi::BidiEvent>,
    closed: Arc<parking_lot::RwLock<Option<String>>>,
}

/// Cleans up a pending-call table entry if the caller's future is dropped
/// (e.g. raced out by a `tokio::select!`) before a response arrives.
struct CancelGuard {
    id: u64,
    pending: PendingTable,
    armed: bool,
}

impl CancelGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.pending.remove(&self.id);
        }
    }
}

impl Connection {
    /// Wraps an already-established transport and spawns its reader and
    /// writer tasks. Returns once both tasks are running; the connection
    /// stays alive until `close()` or a fatal transport error.
    pub fn spawn(sender: TransportSender, receiver: TransportReceiver) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        let pending: PendingTable = Arc::new(DashMap::new());
        let closed = Arc::new(parking_lot::RwLock::new(None));

        tokio::spawn(writer_loop(sender, outbound_rx));
        tokio::spawn(reader_loop(
            receiver,
            Arc::clone(&pending),
            events_tx.clone(),
            Arc::clone(&closed),
        ));

        Self { last_id: Arc::new(AtomicU64::new(1)), pending, outbound_tx, events_tx, closed }
    }

    /// Connects directly to a BiDi endpoint without any session negotiation
    /// — used by tests and by `Client::connect` after it performs
    /// `session.new`/`session.subscribe` on top of this.
    pub async fn connect(url: &str, headers: &[(String, String)]) -> Result<Self> {
        let (sender, receiver) = transport::connect(url, headers).await?;
        Ok(Self::spawn(sender, receiver))
    }

    /// Sends a command and waits for its matched response or `timeout`.
    /// Safe to call concurrently from any number of callers (spec.md §4.1).
    pub async fn send(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Value> {
        if let Some(reason) = self.closed.read().clone() {
            return Err(Error::ClosedByRemote(reason));
        }

        let id = self.last_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        let guard = CancelGuard { id, pending: Arc::clone(&self.pending), armed: true };

        let command = BidiCommand { id, method: method.to_string(), params };
        let payload = serde_json::to_string(&command)?;
        trace!(target: "vibium::bidi", id, method, "send");
        if self.outbound_tx.send(payload).is_err() {
            guard.disarm();
            self.pending.remove(&id);
            return Err(Error::Closed);
        }

        let wait = timeout.unwrap_or(DEFAULT_CALL_TIMEOUT);
        let result = match tokio::time::timeout(wait, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                self.pending.remove(&id);
                Err(Error::Timeout(wait))
            }
        };
        guard.disarm();
        result
    }

    /// Subscribes to every event whose method starts with `prefix` (an
    /// empty prefix matches everything). Dispatch never blocks the reader
    /// loop: a lagging subscriber is told so via [`EventStream::recv`]
    /// rather than slowing down delivery to others.
    pub fn subscribe(&self, prefix: impl Into<String>) -> EventStream {
        EventStream { rx: self.events_tx.subscribe(), prefix: prefix.into() }
    }

    /// Initiates shutdown: fails every pending call with `Closed` and
    /// marks the connection so new sends fail fast.
    pub fn close(&self) {
        *self.closed.write() = Some("connection closed".to_string());
        drain_pending(&self.pending, || Error::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.read().is_some()
    }
}

/// A filtered view onto the connection's event bus.
pub struct EventStream {
    rx: broadcast::Receiver<vibium_protocol::bidi::BidiEvent>,
    prefix: String,
}

impl EventStream {
    /// Waits for the next event matching this stream's prefix. Returns
    /// `None` once the connection is closed and the bus is drained.
    pub async fn recv(&mut self) -> Option<vibium_protocol::bidi::BidiEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.method.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(target: "vibium::bidi", skipped = n, "event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

async fn writer_loop(mut sender: TransportSender, mut outbound_rx: mpsc::UnboundedReceiver<String>) {
    while let Some(payload) = outbound_rx.recv().await {
        if let Err(err) = sender.send_text(payload).await {
            warn!(target: "vibium::bidi", %err, "write failed, connection is dead");
            break;
        }
    }
    let _ = sender.close().await;
}

async fn reader_loop(
    mut receiver: TransportReceiver,
    pending: PendingTable,
    events_tx: broadcast::Sender<vibium_protocol::bidi::BidiEvent>,
    closed: Arc<parking_lot::RwLock<Option<String>>>,
) {
    loop {
        let frame = match receiver.recv_text().await {
            Some(Ok(text)) => text,
            Some(Err(err)) => {
                warn!(target: "vibium::bidi", %err, "transport read failed, connection is fatal");
                fail_all(&pending, &closed, err.to_string());
                return;
            }
            None => {
                debug!(target: "vibium::bidi", "transport closed cleanly");
                fail_all(&pending, &closed, "connection closed by remote".to_string());
                return;
            }
        };

        let message: BidiMessage = match serde_json::from_str(&frame) {
            Ok(message) => message,
            Err(err) => {
                warn!(target: "vibium::bidi", %err, "failed to parse frame, dropping");
                continue;
            }
        };

        match message {
            BidiMessage::Success(success) => {
                if let Some((_, tx)) = pending.remove(&success.id) {
                    let _ = tx.send(Ok(success.result));
                }
            }
            BidiMessage::Error(error) => {
                if let Some((_, tx)) = pending.remove(&error.id) {
                    let message = if error.message.is_empty() { error.error.clone() } else { error.message.clone() };
                    let _ = tx.send(Err(crate::error::Error::Protocol(format!("{}: {message}", error.error))));
                }
            }
            BidiMessage::Event(event) => {
                let _ = events_tx.send(event);
            }
            BidiMessage::Unknown(value) => {
                debug!(target: "vibium::bidi", ?value, "unrecognized frame, ignoring");
            }
        }
    }
}

fn fail_all(pending: &PendingTable, closed: &Arc<parking_lot::RwLock<Option<String>>>, reason: String) {
    *closed.write() = Some(reason.clone());
    drain_pending(pending, || crate::error::Error::ClosedByRemote(reason.clone()));
}

/// Removes and fails every pending call. Takes a key snapshot first since
/// `DashMap` has no atomic drain-all; a call racing in during the snapshot
/// either lands before (and gets failed here) or after (and is failed by
/// the connection's now-closed state on its next send).
fn drain_pending(pending: &PendingTable, make_err: impl Fn() -> Error) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(make_err()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests exercise pieces of the demux loop that don't need a real
    // transport. Constructing a `TransportSender`/`TransportReceiver`
    // requires a real `tokio_tungstenite::WebSocketStream`, so full
    // end-to-end coverage of `connection::spawn` lives in `vibium-cli`'s
    // integration tests against a loopback WebSocket listener instead.

    #[test]
    fn ids_increment_monotonically() {
        let last_id = AtomicU64::new(1);
        let a = last_id.fetch_add(1, Ordering::SeqCst);
        let b = last_id.fetch_add(1, Ordering::SeqCst);
        let c = last_id.fetch_add(1, Ordering::SeqCst);
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[tokio::test]
    async fn cancel_guard_removes_pending_entry_on_drop() {
        let pending: PendingTable = Arc::new(DashMap::new());
        let (tx, _rx) = oneshot::channel();
        pending.insert(42, tx);
        {
            let _guard = CancelGuard { id: 42, pending: Arc::clone(&pending), armed: true };
        }
        assert!(!pending.contains_key(&42));
    }

    #[tokio::test]
    async fn disarmed_guard_leaves_pending_entry() {
        let pending: PendingTable = Arc::new(DashMap::new());
        let (tx, _rx) = oneshot::channel();
        pending.insert(7, tx);
        let guard = CancelGuard { id: 7, pending: Arc::clone(&pending), armed: true };
        guard.disarm();
        assert!(pending.contains_key(&7));
    }
}
