//! Connection registry for the chat room.
//!
//! Every connection that completed its handshake has exactly one entry here.
//! Broadcasts enqueue onto each entry's outbound queue and never await a
//! socket, so a slow recipient cannot hold up delivery to the others.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A payload queued for delivery, shared by every recipient of one broadcast.
pub type Outbound = Arc<[u8]>;

/// Opaque identity assigned to a connection at registration time.
///
/// Identities are handed out from a counter and never reused within one
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a payload could not be queued for a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The recipient's outbound queue is full.
    #[error("outbound queue full")]
    QueueFull,
    /// The recipient's writer has stopped.
    #[error("connection closed")]
    Closed,
}

/// Sending side of a connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    peer_addr: SocketAddr,
    sender: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Create a handle for a connection from `peer_addr`.
    pub fn new(peer_addr: SocketAddr, sender: mpsc::Sender<Outbound>) -> Self {
        Self { peer_addr, sender }
    }

    /// Remote address of the connection.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Queue a payload without waiting.
    pub fn deliver(&self, payload: Outbound) -> std::result::Result<(), DeliveryError> {
        self.sender.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// A registered connection.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Connection identity.
    pub id: ConnectionId,
    /// Display name sent in the handshake.
    pub display_name: String,
    /// Outbound handle.
    pub handle: ConnectionHandle,
    /// Registration timestamp.
    pub joined_at: DateTime<Utc>,
}

/// Shared table of connected clients.
pub struct Registry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<ConnectionId, RegistryEntry>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection and return its new identity.
    ///
    /// The entry is visible to broadcasts as soon as this returns.
    pub async fn register(
        &self,
        handle: ConnectionHandle,
        display_name: impl Into<String>,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = RegistryEntry {
            id,
            display_name: display_name.into(),
            handle,
            joined_at: Utc::now(),
        };

        debug!(
            "Registered {} as {:?} from {}",
            id,
            entry.display_name,
            entry.handle.peer_addr()
        );
        self.entries.write().await.insert(id, entry);
        id
    }

    /// Remove a connection.
    ///
    /// Returns the removed entry the first time, and `None` on every later
    /// call for the same identity, so only one caller emits a departure.
    pub async fn unregister(&self, id: ConnectionId) -> Option<RegistryEntry> {
        let removed = self.entries.write().await.remove(&id);
        if removed.is_some() {
            debug!("Unregistered {}", id);
        }
        removed
    }

    /// All current entries in registration order.
    pub async fn snapshot(&self) -> Vec<RegistryEntry> {
        let mut entries: Vec<RegistryEntry> =
            self.entries.read().await.values().cloned().collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// Display names of all current entries in registration order.
    pub async fn display_names(&self) -> Vec<String> {
        self.snapshot()
            .await
            .into_iter()
            .map(|e| e.display_name)
            .collect()
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no connections are registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Send `payload` verbatim to every connection except `exclude`.
    ///
    /// Returns the number of recipients the payload was queued for. A
    /// recipient that cannot take the payload is logged and skipped; its
    /// entry stays until its own read loop ends.
    pub async fn broadcast(&self, exclude: Option<ConnectionId>, payload: &[u8]) -> usize {
        let payload: Outbound = Arc::from(payload);
        let entries = self.entries.read().await;

        let mut delivered = 0;
        for entry in entries.values() {
            if Some(entry.id) == exclude {
                continue;
            }
            match entry.handle.deliver(Arc::clone(&payload)) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    "Dropped {} bytes for {} ({}): {}",
                    payload.len(),
                    entry.display_name,
                    entry.handle.peer_addr(),
                    e
                ),
            }
        }
        delivered
    }

    /// Convenience wrapper around [`Registry::broadcast`] for text.
    pub async fn broadcast_text(&self, exclude: Option<ConnectionId>, text: &str) -> usize {
        self.broadcast(exclude, text.as_bytes()).await
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
