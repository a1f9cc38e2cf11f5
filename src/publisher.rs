//! Downstream result fan-out.
//!
//! Completed-game results are handed off here and delivered to downstream
//! topics at-least-once. Delivery never runs on the dispatch path: `publish`
//! spawns a task and returns immediately, so a slow or broken broker cannot
//! stall active games. Retries are bounded by the [`RetrySchedule`]; once
//! the attempt ceiling is exhausted the task is reported as a terminal
//! failure instead of retrying forever.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;
use crate::retry::RetrySchedule;

/// Topic carrying a completed game's result and move history.
pub const GAME_RESULT_TOPIC: &str = "chess-game.result";

/// Topic carrying extracted tactical positions.
pub const PUZZLE_RESULT_TOPIC: &str = "puzzle.result";

/// Topic proposing player-pairing relationships.
pub const PARTNER_SUGGESTION_TOPIC: &str = "partner.suggestion";

/// Transport seam to the downstream broker.
#[async_trait]
pub trait ResultTransport: Send + Sync {
    async fn deliver(&self, topic: &str, payload: &Value) -> anyhow::Result<()>;
}

/// One unit of downstream delivery work.
#[derive(Debug, Clone)]
pub struct PublishTask {
    pub topic: String,
    pub payload: Value,
    /// Attempts already made; starts at zero and is owned by the retry loop.
    pub attempt: u32,
}

impl PublishTask {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            attempt: 0,
        }
    }
}

/// Terminal delivery failure, surfaced after the retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery to `{topic}` failed after {attempts} attempts")]
    Exhausted { topic: String, attempts: u32 },
}

/// At-least-once publisher with bounded backoff.
pub struct ResultPublisher {
    transport: Arc<dyn ResultTransport>,
    schedule: RetrySchedule,
    metrics: Arc<ServerMetrics>,
}

impl ResultPublisher {
    #[must_use]
    pub fn new(
        transport: Arc<dyn ResultTransport>,
        schedule: RetrySchedule,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            transport,
            schedule,
            metrics,
        }
    }

    /// Hand a task off for asynchronous delivery and return immediately.
    pub fn publish(self: &Arc<Self>, task: PublishTask) {
        let publisher = Arc::clone(self);
        tokio::spawn(async move {
            // Terminal failures are already logged and counted inside
            // deliver(); nothing to escalate from here.
            let _ = publisher.deliver(task).await;
        });
    }

    /// Publish a batch; each item carries its own retry budget and one
    /// item's failure does not block the others.
    pub fn publish_all(self: &Arc<Self>, tasks: Vec<PublishTask>) {
        for task in tasks {
            self.publish(task);
        }
    }

    /// Drive one task to success or terminal failure.
    ///
    /// Returns the number of attempts made on success. Exposed so tests can
    /// observe the attempt accounting directly.
    pub async fn deliver(&self, mut task: PublishTask) -> Result<u32, DeliveryError> {
        loop {
            task.attempt += 1;
            self.metrics.increment_publish_attempts();

            match self.transport.deliver(&task.topic, &task.payload).await {
                Ok(()) => {
                    if task.attempt > 1 {
                        debug!(
                            topic = %task.topic,
                            attempt = task.attempt,
                            "Delivery succeeded after retry"
                        );
                    }
                    return Ok(task.attempt);
                }
                Err(err) if task.attempt >= self.schedule.max_attempts => {
                    error!(
                        topic = %task.topic,
                        attempts = task.attempt,
                        error = %err,
                        "Delivery failed after all retry attempts; dropping task"
                    );
                    self.metrics.increment_publish_failures();
                    return Err(DeliveryError::Exhausted {
                        topic: task.topic,
                        attempts: task.attempt,
                    });
                }
                Err(err) => {
                    let delay = self.schedule.delay_after(task.attempt);
                    warn!(
                        topic = %task.topic,
                        attempt = task.attempt,
                        max_attempts = self.schedule.max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Delivery failed, retrying after delay"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Transport that writes deliveries to the structured log.
///
/// Stands in for a broker client in single-process deployments; downstream
/// consumers tail the log stream.
#[derive(Debug, Default)]
pub struct LoggingTransport;

#[async_trait]
impl ResultTransport for LoggingTransport {
    async fn deliver(&self, topic: &str, payload: &Value) -> anyhow::Result<()> {
        info!(%topic, %payload, "Result delivered");
        Ok(())
    }
}
