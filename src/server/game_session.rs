use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::chess::BoardEngine;
use crate::protocol::{
    ClockSnapshot, Color, ErrorCode, GameId, GameResult, MoveRecord, PlayerHandle, PromotionPiece,
    TerminationReason, TimeControl,
};

use super::clock::GameClock;

/// Lifecycle of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    InProgress,
    Completed(GameResult),
}

/// Why a submitted move was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("invalid square: {0}")]
    InvalidSquare(String),
    #[error("{0}")]
    IllegalMove(String),
    #[error("the game has already ended")]
    GameCompleted,
}

impl RejectReason {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotYourTurn => ErrorCode::NotYourTurn,
            Self::InvalidSquare(_) => ErrorCode::InvalidSquare,
            Self::IllegalMove(_) => ErrorCode::IllegalMove,
            Self::GameCompleted => ErrorCode::GameCompleted,
        }
    }
}

/// Result of a move submission.
#[derive(Debug, Clone)]
pub enum MoveOutcome {
    Accepted {
        board: String,
        clocks: ClockSnapshot,
        next_to_move: Color,
    },
    /// The move was applied and ended the game.
    Finished { board: String, result: GameResult },
    Rejected(RejectReason),
}

/// Read-only view of the current position, used for reconnect resync.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub board: String,
    pub clocks: ClockSnapshot,
    pub next_to_move: Color,
    pub status: GameStatus,
}

/// Everything that mutates during a game, behind the session lock.
struct SessionState {
    engine: BoardEngine,
    moves: Vec<MoveRecord>,
    clock: GameClock,
    status: GameStatus,
    /// Pending clock-expiry notification for the side to move.
    expiry: Option<CancellationToken>,
    /// Pending abandonment timers for disconnected sides.
    offline: HashMap<Color, CancellationToken>,
}

/// One live game: rules engine, move history, both clocks.
///
/// All mutation is serialized behind a per-game mutex. Clock expiry and
/// abandonment fire as deferred tasks that take the same lock as moves, so
/// exactly one event decides a terminal transition; later events observe
/// `Completed` and back off. Completions reached by timer (rather than by a
/// move) are reported on the completion channel handed in at construction.
pub struct GameSession {
    pub id: GameId,
    pub white: PlayerHandle,
    pub black: PlayerHandle,
    pub time_control: TimeControl,
    abandonment_grace: Duration,
    completions: mpsc::UnboundedSender<GameResult>,
    state: Mutex<SessionState>,
}

impl GameSession {
    /// Create the session and start White's clock.
    pub fn start(
        id: GameId,
        white: PlayerHandle,
        black: PlayerHandle,
        time_control: TimeControl,
        abandonment_grace: Duration,
        completions: mpsc::UnboundedSender<GameResult>,
    ) -> Arc<Self> {
        let now = Instant::now();
        let mut clock = GameClock::new(time_control);
        clock.start(Color::White, now);

        let expiry = CancellationToken::new();
        let session = Arc::new(Self {
            id,
            white,
            black,
            time_control,
            abandonment_grace,
            completions,
            state: Mutex::new(SessionState {
                engine: BoardEngine::new(),
                moves: Vec::new(),
                clock,
                status: GameStatus::InProgress,
                expiry: Some(expiry.clone()),
                offline: HashMap::new(),
            }),
        });

        session.spawn_expiry(Color::White, now + time_control.base_time(), expiry);
        session
    }

    /// The color a participant plays, if they are in this game.
    #[must_use]
    pub fn color_of(&self, handle: &PlayerHandle) -> Option<Color> {
        if *handle == self.white {
            Some(Color::White)
        } else if *handle == self.black {
            Some(Color::Black)
        } else {
            None
        }
    }

    #[must_use]
    pub fn handle_of(&self, color: Color) -> &PlayerHandle {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    #[must_use]
    pub fn opponent_of(&self, handle: &PlayerHandle) -> Option<&PlayerHandle> {
        self.color_of(handle)
            .map(|color| self.handle_of(color.opposite()))
    }

    /// Validate and apply a move for the given participant.
    pub async fn submit_move(
        self: &Arc<Self>,
        mover: &PlayerHandle,
        from: &str,
        to: &str,
        promotion: Option<PromotionPiece>,
    ) -> MoveOutcome {
        let mut state = self.state.lock().await;

        if matches!(state.status, GameStatus::Completed(_)) {
            return MoveOutcome::Rejected(RejectReason::GameCompleted);
        }
        let Some(color) = self.color_of(mover) else {
            return MoveOutcome::Rejected(RejectReason::NotYourTurn);
        };
        if state.engine.turn() != color {
            return MoveOutcome::Rejected(RejectReason::NotYourTurn);
        }
        if let Err(err) = state.engine.apply_move(from, to, promotion) {
            let reason = match err {
                crate::chess::EngineError::InvalidSquare(square) => {
                    RejectReason::InvalidSquare(square)
                }
                other => RejectReason::IllegalMove(other.to_string()),
            };
            return MoveOutcome::Rejected(reason);
        }

        state.moves.push(MoveRecord::new(from, to, promotion));

        let now = Instant::now();
        state.clock.stop(color, now);
        if let Some(token) = state.expiry.take() {
            token.cancel();
        }

        if let Some((reason, winner)) = state.engine.terminal_state() {
            let result = GameResult {
                game_id: self.id,
                winner,
                reason,
            };
            let board = state.engine.fen();
            self.complete(&mut state, result, now);
            return MoveOutcome::Finished { board, result };
        }

        let opponent = color.opposite();
        state.clock.start(opponent, now);
        let deadline = now + state.clock.remaining(opponent, now);
        let expiry = CancellationToken::new();
        state.expiry = Some(expiry.clone());
        self.spawn_expiry(opponent, deadline, expiry);

        debug!(game_id = %self.id, mover = %color, "Move accepted");
        MoveOutcome::Accepted {
            board: state.engine.fen(),
            clocks: state.clock.snapshot(now),
            next_to_move: opponent,
        }
    }

    /// Record that a participant's connection dropped and arm the
    /// abandonment timer. The game itself keeps running.
    pub async fn mark_disconnected(self: &Arc<Self>, handle: &PlayerHandle) {
        let Some(color) = self.color_of(handle) else {
            return;
        };
        let mut state = self.state.lock().await;
        if matches!(state.status, GameStatus::Completed(_)) {
            return;
        }
        if let Some(stale) = state.offline.remove(&color) {
            stale.cancel();
        }
        let token = CancellationToken::new();
        state.offline.insert(color, token.clone());
        drop(state);

        let deadline = Instant::now() + self.abandonment_grace;
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep_until(deadline) => session.abandon(color).await,
            }
        });
        info!(game_id = %self.id, side = %color, "Participant disconnected; grace window armed");
    }

    /// Cancel a pending abandonment timer after the participant returned.
    pub async fn mark_reconnected(&self, handle: &PlayerHandle) {
        let Some(color) = self.color_of(handle) else {
            return;
        };
        let mut state = self.state.lock().await;
        if let Some(token) = state.offline.remove(&color) {
            token.cancel();
            info!(game_id = %self.id, side = %color, "Participant reconnected within grace window");
        }
    }

    /// Current position, clocks, and side to move.
    pub async fn view(&self) -> SessionView {
        let state = self.state.lock().await;
        SessionView {
            board: state.engine.fen(),
            clocks: state.clock.snapshot(Instant::now()),
            next_to_move: state.engine.turn(),
            status: state.status,
        }
    }

    /// Copy of the append-only move history.
    pub async fn move_history(&self) -> Vec<MoveRecord> {
        self.state.lock().await.moves.clone()
    }

    #[must_use]
    pub fn participants(&self) -> [&PlayerHandle; 2] {
        [&self.white, &self.black]
    }

    /// Clock-expiry event for `side`. Runs under the same lock as moves, so
    /// it either wins the race and forfeits the game or observes that a move
    /// (or the other timer) got there first.
    async fn expire_clock(self: Arc<Self>, side: Color) {
        let mut state = self.state.lock().await;
        if matches!(state.status, GameStatus::Completed(_)) {
            return;
        }
        let now = Instant::now();
        if state.clock.running() != Some(side) || state.clock.remaining(side, now) > Duration::ZERO
        {
            // A near-simultaneous move stopped the clock before we got the
            // lock; the rearmed timer owns the next expiry.
            return;
        }

        let result = GameResult {
            game_id: self.id,
            winner: Some(side.opposite()),
            reason: TerminationReason::TimeForfeit,
        };
        info!(game_id = %self.id, flagged = %side, "Clock exhausted");
        self.complete(&mut state, result, now);
    }

    /// Abandonment event for `side` after the grace window elapsed.
    async fn abandon(self: Arc<Self>, side: Color) {
        let mut state = self.state.lock().await;
        if matches!(state.status, GameStatus::Completed(_)) {
            return;
        }
        if state.offline.remove(&side).is_none() {
            // Reconnected concurrently with the timer firing.
            return;
        }

        let result = GameResult {
            game_id: self.id,
            winner: Some(side.opposite()),
            reason: TerminationReason::Abandonment,
        };
        info!(game_id = %self.id, abandoned_by = %side, "Grace window elapsed");
        self.complete(&mut state, result, Instant::now());
    }

    /// Transition to `Completed`, stop both clocks, cancel pending timers,
    /// and report the result on the completion channel.
    fn complete(&self, state: &mut SessionState, result: GameResult, now: Instant) {
        state.status = GameStatus::Completed(result);
        state.clock.stop_all(now);
        if let Some(token) = state.expiry.take() {
            token.cancel();
        }
        for (_, token) in state.offline.drain() {
            token.cancel();
        }
        // The receiver going away means the orchestrator is shutting down;
        // nothing left to notify.
        let _ = self.completions.send(result);
    }

    fn spawn_expiry(self: &Arc<Self>, side: Color, deadline: Instant, token: CancellationToken) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep_until(deadline) => session.expire_clock(side).await,
            }
        });
    }
}
