use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::protocol::{Color, GameParameters, PlayerHandle, TimeControl};

/// A queued matchmaking request awaiting pairing.
#[derive(Debug, Clone)]
pub struct WaitingTicket {
    pub handle: PlayerHandle,
    pub params: GameParameters,
    pub enqueued_at: Instant,
}

/// Two tickets resolved into a game's seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub white: PlayerHandle,
    pub black: PlayerHandle,
    pub time_control: TimeControl,
}

/// Result of an enqueue call.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// Matched against the oldest compatible waiter.
    Paired(Pairing),
    /// No compatible waiter; the ticket is now queued.
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MatchmakeError {
    #[error("a matchmaking request is already pending for this player")]
    DuplicateRequest,
}

/// FIFO matchmaking queue, bucketed by time control.
///
/// Enqueue, cancel and the expiry sweep all run under one lock, so a ticket
/// can never be paired twice or paired after cancellation.
#[derive(Debug, Default)]
pub struct Matchmaker {
    buckets: Mutex<HashMap<TimeControl, VecDeque<WaitingTicket>>>,
}

impl Matchmaker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to pair the request against the oldest compatible waiting ticket;
    /// queue it otherwise. Unequal time controls are never paired.
    pub fn enqueue(
        &self,
        handle: PlayerHandle,
        params: GameParameters,
    ) -> Result<EnqueueOutcome, MatchmakeError> {
        let mut buckets = self.lock();

        if buckets
            .values()
            .flatten()
            .any(|ticket| ticket.handle == handle)
        {
            return Err(MatchmakeError::DuplicateRequest);
        }

        let bucket = buckets.entry(params.time_control).or_default();
        let compatible_idx = bucket
            .iter()
            .position(|waiting| colors_resolvable(waiting.params.preferred_color, params.preferred_color));

        // VecDeque::remove preserves FIFO order of the remaining tickets.
        if let Some(waiting) = compatible_idx.and_then(|idx| bucket.remove(idx)) {
            let pairing = assign_colors(&waiting, &handle, &params);
            debug!(
                white = %pairing.white,
                black = %pairing.black,
                time_control = %pairing.time_control,
                "Tickets paired"
            );
            Ok(EnqueueOutcome::Paired(pairing))
        } else {
            bucket.push_back(WaitingTicket {
                handle,
                params,
                enqueued_at: Instant::now(),
            });
            Ok(EnqueueOutcome::Queued)
        }
    }

    /// Remove a still-waiting ticket. No-op (returns false) if the handle
    /// was already paired or never queued.
    pub fn cancel(&self, handle: &PlayerHandle) -> bool {
        let mut buckets = self.lock();
        let mut removed = false;
        for bucket in buckets.values_mut() {
            let before = bucket.len();
            bucket.retain(|ticket| ticket.handle != *handle);
            removed |= bucket.len() != before;
        }
        removed
    }

    #[must_use]
    pub fn is_queued(&self, handle: &PlayerHandle) -> bool {
        self.lock()
            .values()
            .flatten()
            .any(|ticket| ticket.handle == *handle)
    }

    /// Number of tickets currently waiting across all buckets.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.lock().values().map(VecDeque::len).sum()
    }

    /// Remove and return every ticket that has waited at least `bound`.
    ///
    /// The caller surfaces these as an expired-wait signal; they are never
    /// force-matched.
    pub fn collect_expired(&self, bound: Duration) -> Vec<PlayerHandle> {
        let now = Instant::now();
        let mut buckets = self.lock();
        let mut expired = Vec::new();
        for bucket in buckets.values_mut() {
            bucket.retain(|ticket| {
                if now.saturating_duration_since(ticket.enqueued_at) >= bound {
                    expired.push(ticket.handle.clone());
                    false
                } else {
                    true
                }
            });
        }
        expired
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TimeControl, VecDeque<WaitingTicket>>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Color preferences are resolvable unless both sides insist on the same
/// color.
fn colors_resolvable(waiting: Option<Color>, incoming: Option<Color>) -> bool {
    match (waiting, incoming) {
        (Some(a), Some(b)) => a != b,
        _ => true,
    }
}

/// Seat the pair, honoring explicit preferences; unresolved seats are
/// assigned uniformly at random.
fn assign_colors(waiting: &WaitingTicket, handle: &PlayerHandle, params: &GameParameters) -> Pairing {
    let time_control = params.time_control;
    let waiting_white = match (waiting.params.preferred_color, params.preferred_color) {
        (Some(Color::White), _) | (None, Some(Color::Black)) => true,
        (Some(Color::Black), _) | (None, Some(Color::White)) => false,
        (None, None) => fastrand::bool(),
    };

    if waiting_white {
        Pairing {
            white: waiting.handle.clone(),
            black: handle.clone(),
            time_control,
        }
    } else {
        Pairing {
            white: handle.clone(),
            black: waiting.handle.clone(),
            time_control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(color: Option<Color>, tc: TimeControl) -> GameParameters {
        GameParameters::new(color, tc)
    }

    fn expect_paired(outcome: EnqueueOutcome) -> Pairing {
        match outcome {
            EnqueueOutcome::Paired(pairing) => pairing,
            EnqueueOutcome::Queued => panic!("expected immediate pairing"),
        }
    }

    #[tokio::test]
    async fn test_opposite_preferences_pair_immediately() {
        let matchmaker = Matchmaker::new();
        let queued = matchmaker
            .enqueue("a".into(), params(Some(Color::White), TimeControl::Blitz))
            .unwrap();
        assert!(matches!(queued, EnqueueOutcome::Queued));

        let pairing = expect_paired(
            matchmaker
                .enqueue("b".into(), params(Some(Color::Black), TimeControl::Blitz))
                .unwrap(),
        );
        assert_eq!(pairing.white, PlayerHandle::from("a"));
        assert_eq!(pairing.black, PlayerHandle::from("b"));
        assert_eq!(pairing.time_control, TimeControl::Blitz);
        assert_eq!(matchmaker.waiting_count(), 0);
    }

    #[tokio::test]
    async fn test_same_explicit_color_keeps_both_queued() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(Some(Color::White), TimeControl::Blitz))
            .unwrap();
        let outcome = matchmaker
            .enqueue("b".into(), params(Some(Color::White), TimeControl::Blitz))
            .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Queued));
        assert_eq!(matchmaker.waiting_count(), 2);

        // A compatible third ticket pairs with the oldest waiter.
        let pairing = expect_paired(
            matchmaker
                .enqueue("c".into(), params(Some(Color::Black), TimeControl::Blitz))
                .unwrap(),
        );
        assert_eq!(pairing.white, PlayerHandle::from("a"));
        assert_eq!(pairing.black, PlayerHandle::from("c"));
        assert!(matchmaker.is_queued(&"b".into()));
    }

    #[tokio::test]
    async fn test_unequal_time_controls_never_pair() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(None, TimeControl::Bullet))
            .unwrap();
        let outcome = matchmaker
            .enqueue("b".into(), params(None, TimeControl::Rapid))
            .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Queued));
        assert_eq!(matchmaker.waiting_count(), 2);
    }

    #[tokio::test]
    async fn test_single_explicit_preference_is_honored() {
        for _ in 0..20 {
            let matchmaker = Matchmaker::new();
            matchmaker
                .enqueue("a".into(), params(None, TimeControl::Blitz))
                .unwrap();
            let pairing = expect_paired(
                matchmaker
                    .enqueue("b".into(), params(Some(Color::White), TimeControl::Blitz))
                    .unwrap(),
            );
            assert_eq!(pairing.white, PlayerHandle::from("b"));
            assert_eq!(pairing.black, PlayerHandle::from("a"));
        }
    }

    #[tokio::test]
    async fn test_no_preferences_assign_both_seats() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(None, TimeControl::Blitz))
            .unwrap();
        let pairing = expect_paired(
            matchmaker
                .enqueue("b".into(), params(None, TimeControl::Blitz))
                .unwrap(),
        );
        let seats = [pairing.white.as_str(), pairing.black.as_str()];
        assert!(seats.contains(&"a"));
        assert!(seats.contains(&"b"));
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(None, TimeControl::Blitz))
            .unwrap();
        let err = matchmaker
            .enqueue("a".into(), params(None, TimeControl::Rapid))
            .unwrap_err();
        assert_eq!(err, MatchmakeError::DuplicateRequest);
    }

    #[tokio::test]
    async fn test_cancel_removes_waiting_ticket() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(None, TimeControl::Blitz))
            .unwrap();
        assert!(matchmaker.cancel(&"a".into()));
        assert!(!matchmaker.cancel(&"a".into()));
        assert_eq!(matchmaker.waiting_count(), 0);

        // The cancelled ticket is gone: a new request queues instead of pairing.
        let outcome = matchmaker
            .enqueue("b".into(), params(None, TimeControl::Blitz))
            .unwrap();
        assert!(matches!(outcome, EnqueueOutcome::Queued));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_tickets_are_collected_not_matched() {
        let matchmaker = Matchmaker::new();
        matchmaker
            .enqueue("a".into(), params(None, TimeControl::Blitz))
            .unwrap();

        tokio::time::advance(Duration::from_secs(121)).await;
        matchmaker
            .enqueue("late".into(), params(None, TimeControl::Rapid))
            .unwrap();

        let expired = matchmaker.collect_expired(Duration::from_secs(120));
        assert_eq!(expired, vec![PlayerHandle::from("a")]);
        assert!(!matchmaker.is_queued(&"a".into()));
        assert!(matchmaker.is_queued(&"late".into()));
    }
}
