use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-wide operational counters.
///
/// Counters only; latency histograms and dashboards live with whatever
/// scrapes the `/metrics` endpoint.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    active_connections: AtomicU64,
    connections_replaced: AtomicU64,
    tickets_enqueued: AtomicU64,
    tickets_cancelled: AtomicU64,
    waits_expired: AtomicU64,
    games_started: AtomicU64,
    games_completed: AtomicU64,
    moves_accepted: AtomicU64,
    moves_rejected: AtomicU64,
    chat_relayed: AtomicU64,
    publish_attempts: AtomicU64,
    publish_failures: AtomicU64,
    messages_dropped: AtomicU64,
}

/// Point-in-time view of the counters, served as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub active_connections: u64,
    pub connections_replaced: u64,
    pub tickets_enqueued: u64,
    pub tickets_cancelled: u64,
    pub waits_expired: u64,
    pub games_started: u64,
    pub games_completed: u64,
    pub moves_accepted: u64,
    pub moves_rejected: u64,
    pub chat_relayed: u64,
    pub publish_attempts: u64,
    pub publish_failures: u64,
    pub messages_dropped: u64,
}

impl ServerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrement_connections(&self) {
        // Saturating: a stale disconnect must not wrap the gauge.
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
    }

    pub fn increment_connections_replaced(&self) {
        self.connections_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tickets_enqueued(&self) {
        self.tickets_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_tickets_cancelled(&self) {
        self.tickets_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_waits_expired(&self) {
        self.waits_expired.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_started(&self) {
        self.games_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_games_completed(&self) {
        self.games_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_moves_accepted(&self) {
        self.moves_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_moves_rejected(&self) {
        self.moves_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_chat_relayed(&self) {
        self.chat_relayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_attempts(&self) {
        self.publish_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_messages_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            connections_replaced: self.connections_replaced.load(Ordering::Relaxed),
            tickets_enqueued: self.tickets_enqueued.load(Ordering::Relaxed),
            tickets_cancelled: self.tickets_cancelled.load(Ordering::Relaxed),
            waits_expired: self.waits_expired.load(Ordering::Relaxed),
            games_started: self.games_started.load(Ordering::Relaxed),
            games_completed: self.games_completed.load(Ordering::Relaxed),
            moves_accepted: self.moves_accepted.load(Ordering::Relaxed),
            moves_rejected: self.moves_rejected.load(Ordering::Relaxed),
            chat_relayed: self.chat_relayed.load(Ordering::Relaxed),
            publish_attempts: self.publish_attempts.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}
