use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::metrics::ServerMetrics;
use crate::protocol::{PlayerHandle, ServerMessage};

/// A live connection as the registry tracks it.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub sender: mpsc::Sender<Arc<ServerMessage>>,
    /// Cancelling this token tells the transport task to close the socket.
    pub closer: CancellationToken,
    /// Monotonic registration number. A disconnect only removes the entry
    /// whose generation it carries, so a stale close can never evict a
    /// newer connection for the same handle.
    pub generation: u64,
    pub last_ping: Instant,
}

/// Concurrent handle → connection map. Last registration wins.
pub struct ConnectionRegistry {
    clients: DashMap<PlayerHandle, ClientConnection>,
    next_generation: AtomicU64,
    metrics: Arc<ServerMetrics>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        Self {
            clients: DashMap::new(),
            next_generation: AtomicU64::new(1),
            metrics,
        }
    }

    /// Register a connection for the handle, replacing any prior one.
    ///
    /// Returns this registration's generation and the displaced connection,
    /// which the caller is responsible for closing.
    pub fn register(
        &self,
        handle: PlayerHandle,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        closer: CancellationToken,
    ) -> (u64, Option<ClientConnection>) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let prior = self.clients.insert(
            handle,
            ClientConnection {
                sender,
                closer,
                generation,
                last_ping: Instant::now(),
            },
        );
        self.metrics.increment_connections();
        if prior.is_some() {
            self.metrics.increment_connections_replaced();
            // The replaced connection still counted as active.
            self.metrics.decrement_connections();
        }
        (generation, prior)
    }

    #[must_use]
    pub fn lookup(&self, handle: &PlayerHandle) -> Option<mpsc::Sender<Arc<ServerMessage>>> {
        self.clients.get(handle).map(|entry| entry.sender.clone())
    }

    /// Remove the handle's connection if it still belongs to `generation`.
    /// Idempotent; returns whether an entry was removed.
    pub fn remove(&self, handle: &PlayerHandle, generation: u64) -> bool {
        let removed = self
            .clients
            .remove_if(handle, |_, connection| connection.generation == generation)
            .is_some();
        if removed {
            self.metrics.decrement_connections();
        }
        removed
    }

    /// Queue a message for the handle's live connection, if any.
    ///
    /// A full or closed per-connection queue drops the message for that
    /// connection only; game state is unaffected.
    pub fn send_to(&self, handle: &PlayerHandle, message: Arc<ServerMessage>) {
        let Some(sender) = self.lookup(handle) else {
            return;
        };
        if sender.try_send(message).is_err() {
            self.metrics.increment_messages_dropped();
            warn!(%handle, "Failed to queue message for client; dropping");
        }
    }

    /// Refresh the heartbeat timestamp for a live connection.
    pub fn record_ping(&self, handle: &PlayerHandle) {
        if let Some(mut connection) = self.clients.get_mut(handle) {
            connection.last_ping = Instant::now();
        }
    }

    /// Closers of connections that have not pinged within `timeout`.
    ///
    /// The entries stay registered; cancelling the closer makes the
    /// transport shut down, which tears the entry down through the normal
    /// disconnect path.
    #[must_use]
    pub fn collect_idle(&self, timeout: Duration) -> Vec<(PlayerHandle, CancellationToken)> {
        let now = Instant::now();
        self.clients
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.last_ping) > timeout)
            .map(|entry| (entry.key().clone(), entry.closer.clone()))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, handle: &PlayerHandle) -> bool {
        self.clients.contains_key(handle)
    }
}
