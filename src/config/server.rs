//! Server and publisher behavior configuration.

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_abandonment_grace_secs, default_chat_max_length, default_matchmaking_wait_bound_secs,
    default_max_message_size, default_message_queue_capacity, default_ping_timeout_secs,
    default_publish_backoff_multiplier, default_publish_initial_delay_ms,
    default_publish_jitter_factor, default_publish_max_attempts, default_publish_max_delay_ms,
    default_sweep_interval_secs,
};

/// Session/matchmaking behavior, as read from the config file.
///
/// Durations are plain seconds here; `main` converts them into the runtime
/// [`crate::server::ServerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Maximum inbound WebSocket frame size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    /// Maximum chat line length in characters
    #[serde(default = "default_chat_max_length")]
    pub chat_max_length: usize,
    /// Grace window before a disconnected game is scored as abandoned
    #[serde(default = "default_abandonment_grace_secs")]
    pub abandonment_grace_secs: u64,
    /// How long a matchmaking ticket may wait before expiring
    #[serde(default = "default_matchmaking_wait_bound_secs")]
    pub matchmaking_wait_bound_secs: u64,
    /// How long a connection may go without a ping before being closed
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,
    /// Cadence of the expired-ticket and idle-connection sweep
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Per-connection outbound queue depth
    #[serde(default = "default_message_queue_capacity")]
    pub message_queue_capacity: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            chat_max_length: default_chat_max_length(),
            abandonment_grace_secs: default_abandonment_grace_secs(),
            matchmaking_wait_bound_secs: default_matchmaking_wait_bound_secs(),
            ping_timeout_secs: default_ping_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            message_queue_capacity: default_message_queue_capacity(),
        }
    }
}

/// Result publisher retry policy, as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherSection {
    #[serde(default = "default_publish_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_publish_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_publish_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_publish_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_publish_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            max_attempts: default_publish_max_attempts(),
            initial_delay_ms: default_publish_initial_delay_ms(),
            max_delay_ms: default_publish_max_delay_ms(),
            backoff_multiplier: default_publish_backoff_multiplier(),
            jitter_factor: default_publish_jitter_factor(),
        }
    }
}

impl PublisherSection {
    /// Convert into the runtime retry schedule.
    #[must_use]
    pub fn to_retry_schedule(&self) -> crate::retry::RetrySchedule {
        crate::retry::RetrySchedule {
            max_attempts: self.max_attempts.max(1),
            initial_delay: std::time::Duration::from_millis(self.initial_delay_ms),
            max_delay: std::time::Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}
