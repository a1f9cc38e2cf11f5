use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::ServerMetrics;
use crate::protocol::validation::validate_chat_body;
use crate::protocol::{
    Color, ErrorCode, GameId, GameParameters, GameResult, GameResumedPayload, GameStartedPayload,
    PlayerHandle, PromotionPiece, ServerMessage, TerminationReason, TimeControl,
};
use crate::publisher::{
    PublishTask, ResultPublisher, ResultTransport, GAME_RESULT_TOPIC, PARTNER_SUGGESTION_TOPIC,
    PUZZLE_RESULT_TOPIC,
};
use crate::retry::RetrySchedule;
use crate::storage::{GameStore, StoredGame};

pub mod clock;
pub mod connection_registry;
pub mod game_session;
pub mod matchmaker;
mod message_router;

use connection_registry::ConnectionRegistry;
use game_session::{GameSession, GameStatus, MoveOutcome};
use matchmaker::{EnqueueOutcome, Matchmaker, Pairing};

pub use game_session::{RejectReason, SessionView};
pub use matchmaker::MatchmakeError;

/// Runtime server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_message_size: usize,
    pub chat_max_length: usize,
    /// How long a disconnected participant may stay away before the game is
    /// scored as abandoned.
    pub abandonment_grace: Duration,
    /// How long a ticket may wait before it is surfaced as expired.
    pub matchmaking_wait_bound: Duration,
    /// How long a connection may go without a ping before it is closed.
    pub ping_timeout: Duration,
    /// Cadence of the expired-ticket and idle-connection sweep.
    pub sweep_interval: Duration,
    /// Per-connection outbound queue depth.
    pub message_queue_capacity: usize,
    pub retry: RetrySchedule,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024,
            chat_max_length: 256,
            abandonment_grace: Duration::from_secs(60),
            matchmaking_wait_bound: Duration::from_secs(120),
            ping_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            message_queue_capacity: 64,
            retry: RetrySchedule::default(),
        }
    }
}

/// Session orchestrator: the single entry point transports call into.
///
/// Owns the connection registry, the matchmaking queue, and one
/// [`GameSession`] per live game. Unrelated games share nothing but the maps
/// that index them, so they proceed fully in parallel.
pub struct GameServer {
    config: ServerConfig,
    registry: ConnectionRegistry,
    matchmaker: Matchmaker,
    games: DashMap<GameId, Arc<GameSession>>,
    active_games: DashMap<PlayerHandle, GameId>,
    store: Arc<dyn GameStore>,
    publisher: Arc<ResultPublisher>,
    metrics: Arc<ServerMetrics>,
    completions_tx: mpsc::UnboundedSender<GameResult>,
}

impl GameServer {
    /// Build the server and spawn its background tasks (clock-driven
    /// completion handling and the periodic sweep).
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn GameStore>,
        transport: Arc<dyn ResultTransport>,
    ) -> Arc<Self> {
        let metrics = Arc::new(ServerMetrics::new());
        let publisher = Arc::new(ResultPublisher::new(
            transport,
            config.retry.clone(),
            metrics.clone(),
        ));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let server = Arc::new(Self {
            registry: ConnectionRegistry::new(metrics.clone()),
            matchmaker: Matchmaker::new(),
            games: DashMap::new(),
            active_games: DashMap::new(),
            store,
            publisher,
            metrics,
            completions_tx,
            config,
        });

        server.spawn_completion_loop(completions_rx);
        server.spawn_sweep_task();
        server
    }

    /// Register a freshly opened, already-authenticated connection.
    ///
    /// Returns the registration generation the transport must present on
    /// disconnect. Any prior connection for the handle is told to close; if
    /// a game is in progress the client receives a `GameResumed` snapshot.
    pub async fn on_connect(
        &self,
        handle: PlayerHandle,
        sender: mpsc::Sender<Arc<ServerMessage>>,
        closer: CancellationToken,
    ) -> u64 {
        let (generation, prior) = self.registry.register(handle.clone(), sender, closer);
        if let Some(prior) = prior {
            info!(%handle, "Replacing prior connection for handle");
            prior.closer.cancel();
        }

        if let Some(session) = self.active_session(&handle) {
            session.mark_reconnected(&handle).await;
            let view = session.view().await;
            if view.status == GameStatus::InProgress {
                if let Some(color) = session.color_of(&handle) {
                    let opponent = session.handle_of(color.opposite()).clone();
                    self.registry.send_to(
                        &handle,
                        Arc::new(ServerMessage::GameResumed(Box::new(GameResumedPayload {
                            game_id: session.id,
                            opponent,
                            color,
                            time_control: session.time_control,
                            board: view.board,
                            clocks: view.clocks,
                            next_to_move: view.next_to_move,
                        }))),
                    );
                }
            }
        }

        info!(%handle, generation, "Client connected");
        generation
    }

    /// Tear down a closed connection.
    ///
    /// Cancels a waiting matchmaking ticket and arms the active game's
    /// grace window; the game itself keeps running.
    pub async fn on_disconnect(&self, handle: &PlayerHandle, generation: u64) {
        if !self.registry.remove(handle, generation) {
            debug!(%handle, generation, "Ignoring stale disconnect");
            return;
        }

        if self.matchmaker.cancel(handle) {
            self.metrics.increment_tickets_cancelled();
            info!(%handle, "Cancelled waiting ticket on disconnect");
        }

        if let Some(session) = self.active_session(handle) {
            session.mark_disconnected(handle).await;
        }

        info!(%handle, "Client disconnected");
    }

    pub(crate) async fn handle_match_request(
        &self,
        handle: &PlayerHandle,
        preferred_color: Option<Color>,
        time_control: TimeControl,
    ) {
        if self.active_games.contains_key(handle) {
            self.send_error(handle, ErrorCode::DuplicateRequest);
            return;
        }

        let params = GameParameters::new(preferred_color, time_control);
        match self.matchmaker.enqueue(handle.clone(), params) {
            Ok(EnqueueOutcome::Paired(pairing)) => {
                self.start_game(pairing).await;
            }
            Ok(EnqueueOutcome::Queued) => {
                self.metrics.increment_tickets_enqueued();
                self.registry
                    .send_to(handle, Arc::new(ServerMessage::MatchQueued));
            }
            Err(err @ MatchmakeError::DuplicateRequest) => {
                warn!(%handle, "Rejected duplicate matchmaking request");
                self.registry.send_to(
                    handle,
                    Arc::new(ServerMessage::Error {
                        message: err.to_string(),
                        error_code: Some(ErrorCode::DuplicateRequest),
                    }),
                );
            }
        }
    }

    async fn start_game(&self, pairing: Pairing) {
        let game_id = Uuid::new_v4();
        let session = GameSession::start(
            game_id,
            pairing.white.clone(),
            pairing.black.clone(),
            pairing.time_control,
            self.config.abandonment_grace,
            self.completions_tx.clone(),
        );
        self.games.insert(game_id, session);
        self.active_games.insert(pairing.white.clone(), game_id);
        self.active_games.insert(pairing.black.clone(), game_id);
        self.metrics.increment_games_started();

        if let Err(err) = self
            .store
            .save_starter_game(StoredGame::started(
                game_id,
                pairing.white.clone(),
                pairing.black.clone(),
                pairing.time_control,
            ))
            .await
        {
            warn!(%game_id, error = %err, "Failed to persist starter game");
        }

        for (player, opponent, color) in [
            (&pairing.white, &pairing.black, Color::White),
            (&pairing.black, &pairing.white, Color::Black),
        ] {
            self.registry.send_to(
                player,
                Arc::new(ServerMessage::GameStarted(GameStartedPayload {
                    game_id,
                    opponent: opponent.clone(),
                    color,
                    time_control: pairing.time_control,
                })),
            );
        }

        info!(
            %game_id,
            white = %pairing.white,
            black = %pairing.black,
            time_control = %pairing.time_control,
            "Game started"
        );
    }

    pub(crate) async fn handle_move(
        &self,
        handle: &PlayerHandle,
        from: &str,
        to: &str,
        promotion: Option<PromotionPiece>,
    ) {
        let Some(session) = self.active_session(handle) else {
            self.metrics.increment_moves_rejected();
            self.registry.send_to(
                handle,
                Arc::new(ServerMessage::MoveRejected {
                    reason: ErrorCode::NoActiveGame.description().to_string(),
                    error_code: ErrorCode::NoActiveGame,
                }),
            );
            return;
        };

        match session.submit_move(handle, from, to, promotion).await {
            MoveOutcome::Accepted {
                board,
                clocks,
                next_to_move,
            } => {
                self.metrics.increment_moves_accepted();
                self.broadcast_to_game(
                    &session,
                    Arc::new(ServerMessage::MoveAccepted {
                        board,
                        clocks,
                        next_to_move,
                    }),
                );
            }
            MoveOutcome::Finished { result, .. } => {
                self.metrics.increment_moves_accepted();
                self.finish_game(result).await;
            }
            MoveOutcome::Rejected(reason) => {
                self.metrics.increment_moves_rejected();
                self.registry.send_to(
                    handle,
                    Arc::new(ServerMessage::MoveRejected {
                        error_code: reason.error_code(),
                        reason: reason.to_string(),
                    }),
                );
            }
        }
    }

    pub(crate) async fn handle_chat(&self, handle: &PlayerHandle, body: String) {
        if let Err(err) = validate_chat_body(&body, self.config.chat_max_length) {
            self.registry.send_to(
                handle,
                Arc::new(ServerMessage::Error {
                    message: err.to_string(),
                    error_code: Some(err.error_code()),
                }),
            );
            return;
        }

        let Some(session) = self.active_session(handle) else {
            self.send_error(handle, ErrorCode::NoActiveGame);
            return;
        };
        let Some(opponent) = session.opponent_of(handle) else {
            return;
        };

        self.metrics.increment_chat_relayed();
        self.registry.send_to(
            opponent,
            Arc::new(ServerMessage::ChatText {
                from: handle.clone(),
                body,
            }),
        );
    }

    pub(crate) fn handle_ping(&self, handle: &PlayerHandle) {
        self.registry.record_ping(handle);
        self.registry
            .send_to(handle, Arc::new(ServerMessage::Pong));
    }

    /// Transport-level rejection for an oversized frame.
    pub fn handle_oversized_message(&self, handle: &PlayerHandle, size: usize, max: usize) {
        self.registry.send_to(
            handle,
            Arc::new(ServerMessage::Error {
                message: format!("message too large ({size} bytes, max {max} bytes)"),
                error_code: Some(ErrorCode::MessageTooLarge),
            }),
        );
    }

    /// Transport-level rejection for an unparseable frame.
    pub fn handle_malformed_message(&self, handle: &PlayerHandle, code: ErrorCode) {
        self.send_error(handle, code);
    }

    /// Archive a completed game: notify both players, persist the final
    /// history, and hand downstream fan-out to the publisher.
    ///
    /// Idempotent — a move-driven completion and the session's own
    /// completion event may both land here; whoever removes the game from
    /// the index first does the work.
    async fn finish_game(&self, result: GameResult) {
        let Some((_, session)) = self.games.remove(&result.game_id) else {
            return;
        };
        for participant in session.participants() {
            self.active_games
                .remove_if(participant, |_, game_id| *game_id == result.game_id);
        }

        let moves = session.move_history().await;
        let view = session.view().await;

        self.broadcast_to_game(&session, Arc::new(ServerMessage::GameEnded { result }));

        if let Err(err) = self
            .store
            .update_completed_game(result.game_id, moves.clone(), result)
            .await
        {
            warn!(game_id = %result.game_id, error = %err, "Failed to persist completed game");
        }
        self.metrics.increment_games_completed();

        let mut tasks = vec![PublishTask::new(
            GAME_RESULT_TOPIC,
            json!({
                "game_id": result.game_id,
                "white": session.white,
                "black": session.black,
                "time_control": session.time_control,
                "winner": result.winner,
                "reason": result.reason,
                "moves": moves,
            }),
        )];

        if result.reason == TerminationReason::Checkmate {
            // The mating position is the tactical-extraction candidate.
            tasks.push(PublishTask::new(
                PUZZLE_RESULT_TOPIC,
                json!({
                    "game_id": result.game_id,
                    "board": view.board,
                    "winner": result.winner,
                    "mating_move": moves.last().map(crate::protocol::MoveRecord::uci),
                }),
            ));
        }

        for (player, partner) in [
            (&session.white, &session.black),
            (&session.black, &session.white),
        ] {
            tasks.push(PublishTask::new(
                PARTNER_SUGGESTION_TOPIC,
                json!({ "player": player, "suggested_partner": partner }),
            ));
        }

        self.publisher.publish_all(tasks);

        info!(
            game_id = %result.game_id,
            reason = ?result.reason,
            winner = ?result.winner,
            "Game completed"
        );
    }

    fn broadcast_to_game(&self, session: &GameSession, message: Arc<ServerMessage>) {
        for participant in session.participants() {
            self.registry.send_to(participant, Arc::clone(&message));
        }
    }

    fn send_error(&self, handle: &PlayerHandle, code: ErrorCode) {
        self.registry.send_to(
            handle,
            Arc::new(ServerMessage::Error {
                message: code.description().to_string(),
                error_code: Some(code),
            }),
        );
    }

    fn active_session(&self, handle: &PlayerHandle) -> Option<Arc<GameSession>> {
        let game_id = *self.active_games.get(handle)?;
        self.games.get(&game_id).map(|entry| Arc::clone(entry.value()))
    }

    fn spawn_completion_loop(
        self: &Arc<Self>,
        mut completions_rx: mpsc::UnboundedReceiver<GameResult>,
    ) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(result) = completions_rx.recv().await {
                server.finish_game(result).await;
            }
        });
    }

    /// Periodic sweep: surface expired matchmaking waits and close
    /// connections that stopped pinging.
    fn spawn_sweep_task(self: &Arc<Self>) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(server.config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                for handle in server
                    .matchmaker
                    .collect_expired(server.config.matchmaking_wait_bound)
                {
                    server.metrics.increment_waits_expired();
                    server
                        .registry
                        .send_to(&handle, Arc::new(ServerMessage::WaitExpired));
                    info!(%handle, "Matchmaking wait expired");
                }

                for (handle, closer) in server.registry.collect_idle(server.config.ping_timeout) {
                    info!(%handle, "Closing idle connection");
                    closer.cancel();
                }
            }
        });
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Server metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The persistence collaborator.
    #[must_use]
    pub fn store(&self) -> Arc<dyn GameStore> {
        Arc::clone(&self.store)
    }

    /// The game a handle is currently playing in, if any.
    #[must_use]
    pub fn active_game_of(&self, handle: &PlayerHandle) -> Option<GameId> {
        self.active_games.get(handle).map(|entry| *entry)
    }

    /// Number of tickets currently waiting for a partner.
    #[must_use]
    pub fn waiting_count(&self) -> usize {
        self.matchmaker.waiting_count()
    }

    /// Number of games currently in progress.
    #[must_use]
    pub fn live_game_count(&self) -> usize {
        self.games.len()
    }
}
