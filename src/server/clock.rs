use std::time::Duration;

use tokio::time::Instant;

use crate::protocol::{ClockSnapshot, Color, TimeControl};

/// Paired countdown clocks for one game.
///
/// At most one side runs at a time; starting a side stops the other. The
/// clock itself is passive — expiry scheduling lives with the game session,
/// which owns the serialization of clock events against moves.
#[derive(Debug, Clone)]
pub struct GameClock {
    white: ClockSide,
    black: ClockSide,
}

#[derive(Debug, Clone, Copy)]
struct ClockSide {
    remaining: Duration,
    running_since: Option<Instant>,
}

impl ClockSide {
    fn new(budget: Duration) -> Self {
        Self {
            remaining: budget,
            running_since: None,
        }
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.remaining.saturating_sub(now.saturating_duration_since(since)),
            None => self.remaining,
        }
    }

    fn stop(&mut self, now: Instant) {
        self.remaining = self.remaining_at(now);
        self.running_since = None;
    }
}

impl GameClock {
    #[must_use]
    pub fn new(time_control: TimeControl) -> Self {
        let budget = time_control.base_time();
        Self {
            white: ClockSide::new(budget),
            black: ClockSide::new(budget),
        }
    }

    fn side(&self, color: Color) -> &ClockSide {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn side_mut(&mut self, color: Color) -> &mut ClockSide {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    /// Start one side's countdown, stopping the other side if it was
    /// running.
    pub fn start(&mut self, color: Color, now: Instant) {
        self.side_mut(color.opposite()).stop(now);
        let side = self.side_mut(color);
        if side.running_since.is_none() {
            side.running_since = Some(now);
        }
    }

    pub fn stop(&mut self, color: Color, now: Instant) {
        self.side_mut(color).stop(now);
    }

    pub fn stop_all(&mut self, now: Instant) {
        self.white.stop(now);
        self.black.stop(now);
    }

    #[must_use]
    pub fn remaining(&self, color: Color, now: Instant) -> Duration {
        self.side(color).remaining_at(now)
    }

    /// Which side is currently counting down, if any.
    #[must_use]
    pub fn running(&self) -> Option<Color> {
        if self.white.running_since.is_some() {
            Some(Color::White)
        } else if self.black.running_since.is_some() {
            Some(Color::Black)
        } else {
            None
        }
    }

    #[must_use]
    pub fn snapshot(&self, now: Instant) -> ClockSnapshot {
        ClockSnapshot {
            white_ms: self.white.remaining_at(now).as_millis() as u64,
            black_ms: self.black.remaining_at(now).as_millis() as u64,
        }
    }
}
