use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pawn_fish_server::protocol::{PlayerHandle, ServerMessage};
use pawn_fish_server::publisher::ResultTransport;
use pawn_fish_server::retry::RetrySchedule;
use pawn_fish_server::server::{GameServer, ServerConfig};
use pawn_fish_server::storage::InMemoryGameStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Transport that records every delivery, for asserting on fan-out.
#[derive(Default)]
pub struct RecordingTransport {
    deliveries: Mutex<Vec<(String, serde_json::Value)>>,
}

#[async_trait]
impl ResultTransport for RecordingTransport {
    async fn deliver(&self, topic: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        self.deliveries
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn deliveries_for(&self, topic: &str) -> Vec<serde_json::Value> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

/// Default server configuration optimized for testing
#[allow(dead_code)]
pub fn test_server_config() -> ServerConfig {
    ServerConfig {
        max_message_size: 16 * 1024,
        chat_max_length: 256,
        abandonment_grace: Duration::from_secs(30),
        matchmaking_wait_bound: Duration::from_secs(120),
        ping_timeout: Duration::from_secs(600), // Generous so tests control their own closes
        sweep_interval: Duration::from_secs(1), // Fast sweep for tests
        message_queue_capacity: 64,
        retry: RetrySchedule {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
        },
    }
}

/// Create a test server with an in-memory store and a recording transport.
#[allow(dead_code)]
pub fn create_test_server() -> (Arc<GameServer>, Arc<RecordingTransport>) {
    create_test_server_with_config(test_server_config())
}

#[allow(dead_code)]
pub fn create_test_server_with_config(
    config: ServerConfig,
) -> (Arc<GameServer>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let server = GameServer::new(
        config,
        Arc::new(InMemoryGameStore::new()),
        transport.clone(),
    );
    (server, transport)
}

/// A directly connected client, bypassing the WebSocket transport.
#[allow(dead_code)]
pub struct TestClient {
    pub handle: PlayerHandle,
    pub generation: u64,
    pub closer: CancellationToken,
    pub rx: mpsc::Receiver<Arc<ServerMessage>>,
}

#[allow(dead_code)]
impl TestClient {
    /// Register a connection for `name` on the server.
    pub async fn connect(server: &GameServer, name: &str) -> Self {
        let handle = PlayerHandle::from(name);
        let (tx, rx) = mpsc::channel(64);
        let closer = CancellationToken::new();
        let generation = server.on_connect(handle.clone(), tx, closer.clone()).await;
        Self {
            handle,
            generation,
            closer,
            rx,
        }
    }

    /// Next queued server message, or panic after a bounded wait.
    pub async fn expect_message(&mut self) -> ServerMessage {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for server message")
            .map(|message| (*message).clone())
            .expect("connection channel closed")
    }

    /// Assert that nothing is queued for this client right now.
    pub fn expect_silence(&mut self) {
        if let Ok(message) = self.rx.try_recv() {
            panic!("unexpected message: {message:?}");
        }
    }
}
