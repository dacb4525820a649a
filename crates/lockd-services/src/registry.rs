//! Connection Registry — which live connection answers for which device.
//!
//! Two tables: every open connection (for broadcast fan-out), and the
//! address → connection bindings used by routing. A binding never owns
//! the directory record; dropping it leaves the record untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use lockd_core::ServerMessage;

pub type ConnectionId = u64;

/// What a connection's writer task should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Flush what is queued, then close the socket.
    Close,
}

/// The writer side of the connection is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("connection {0} is closed")]
pub struct ConnectionClosed(pub ConnectionId);

/// Cheap, cloneable sender half of one device socket.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, msg: ServerMessage) -> Result<(), ConnectionClosed> {
        self.tx
            .send(Outbound::Message(msg))
            .map_err(|_| ConnectionClosed(self.id))
    }

    pub fn close(&self) {
        // Already-closed is fine: that is what we wanted.
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct OpenConnection {
    handle: ConnectionHandle,
    bound: Option<String>,
}

/// Shared between the gateway, monitor and router.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    next_id: Arc<AtomicU64>,
    open: Arc<DashMap<ConnectionId, OpenConnection>>,
    bindings: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh, unbound connection. Returns its handle.
    pub fn register(&self, tx: mpsc::UnboundedSender<Outbound>) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = ConnectionHandle { id, tx };
        self.open.insert(
            id,
            OpenConnection {
                handle: handle.clone(),
                bound: None,
            },
        );
        tracing::debug!(connection = id, "connection registered");
        handle
    }

    /// Make `conn` the connection that answers for `address`.
    ///
    /// A connection previously bound to `address` stays open but is no
    /// longer addressable. If `conn` was bound to a different address,
    /// that binding is released first.
    pub fn bind(&self, conn: &ConnectionHandle, address: &str) {
        let previous_address = match self.open.get_mut(&conn.id) {
            Some(mut entry) => entry.bound.replace(address.to_string()),
            None => {
                tracing::debug!(connection = conn.id, "bind on closed connection ignored");
                return;
            }
        };

        if let Some(prev) = previous_address.filter(|p| p != address) {
            self.bindings.remove_if(&prev, |_, h| h.id == conn.id);
            tracing::info!(connection = conn.id, from = %prev, to = %address, "connection rebound");
        }

        if let Some(old) = self.bindings.insert(address.to_string(), conn.clone()) {
            if old.id != conn.id {
                if let Some(mut entry) = self.open.get_mut(&old.id) {
                    entry.bound = None;
                }
                tracing::info!(
                    address = %address,
                    superseded = old.id,
                    connection = conn.id,
                    "binding superseded by newer connection"
                );
            }
        }
    }

    pub fn lookup(&self, address: &str) -> Option<ConnectionHandle> {
        self.bindings.get(address).map(|h| h.value().clone())
    }

    /// Address `id` currently answers for, if any.
    pub fn bound_address(&self, id: ConnectionId) -> Option<String> {
        self.open.get(&id).and_then(|e| e.bound.clone())
    }

    /// Drop whatever binding `id` holds. The directory is not touched.
    pub fn unbind(&self, id: ConnectionId) {
        let bound = self.open.get_mut(&id).and_then(|mut e| e.bound.take());
        if let Some(address) = bound {
            self.bindings.remove_if(&address, |_, h| h.id == id);
            tracing::debug!(connection = id, address = %address, "connection unbound");
        }
    }

    /// Socket closed: unbind and forget the connection.
    pub fn deregister(&self, id: ConnectionId) {
        self.unbind(id);
        self.open.remove(&id);
        tracing::debug!(connection = id, "connection deregistered");
    }

    /// Apply `f` to every open connection along with its bound address.
    ///
    /// Works on a snapshot, so `f` may call back into the registry.
    pub fn broadcast_each(&self, mut f: impl FnMut(&ConnectionHandle, Option<&str>)) {
        let snapshot: Vec<(ConnectionHandle, Option<String>)> = self
            .open
            .iter()
            .map(|e| (e.handle.clone(), e.bound.clone()))
            .collect();
        for (handle, bound) in &snapshot {
            f(handle, bound.as_deref());
        }
    }

    /// Ask every open connection to close, then wait up to `grace` for
    /// their sessions to deregister. Returns how many were still open.
    pub async fn close_all(&self, grace: Duration) -> usize {
        self.broadcast_each(|conn, _| conn.close());
        let drained = tokio::time::timeout(grace, async {
            while !self.is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        if drained.is_ok() { 0 } else { self.len() }
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Number of addresses with a bound connection.
    pub fn bound_count(&self) -> usize {
        self.bindings.len()
    }
}
