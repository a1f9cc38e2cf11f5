use std::time::Duration;

/// Bounded exponential backoff schedule, carried as plain data.
///
/// The publisher walks attempts 1..=max_attempts and asks this schedule for
/// the delay to sleep after each failure. Termination is deterministic: once
/// the attempt ceiling is reached the operation fails for good.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    /// Maximum number of delivery attempts (including the first)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Ceiling for the computed delay
    pub max_delay: Duration,
    /// Multiplier applied per subsequent failure
    pub backoff_multiplier: f64,
    /// Amount of jitter to add (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetrySchedule {
    /// Delay to sleep after the given failed attempt (1-based).
    ///
    /// Exponential in the attempt number, capped at `max_delay`, with up to
    /// `jitter_factor` of random extra spread.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let scaled = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent as i32);
        let mut delay = Duration::from_millis(scaled as u64).min(self.max_delay);

        if self.jitter_factor > 0.0 {
            let jitter_ceiling = (delay.as_millis() as f64 * self.jitter_factor) as u64;
            delay += Duration::from_millis(fastrand::u64(0..=jitter_ceiling));
        }

        delay
    }
}
