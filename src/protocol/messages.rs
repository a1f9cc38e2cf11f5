use serde::{Deserialize, Serialize};

use super::error_codes::ErrorCode;
use super::types::{
    ClockSnapshot, Color, GameId, GameResult, PlayerHandle, PromotionPiece, TimeControl,
};

/// Message types sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    /// Ask to be paired into a new game
    MatchRequest {
        #[serde(skip_serializing_if = "Option::is_none", default)]
        preferred_color: Option<Color>,
        time_control: TimeControl,
    },
    /// Submit a move in the active game
    Move {
        from: String,
        to: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        promotion: Option<PromotionPiece>,
    },
    /// Send a chat line to the opponent (blank bodies are rejected)
    ChatText { body: String },
    /// Heartbeat to maintain connection
    Ping,
}

/// Payload for the GameStarted server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStartedPayload {
    pub game_id: GameId,
    pub opponent: PlayerHandle,
    pub color: Color,
    pub time_control: TimeControl,
}

/// Payload for the GameResumed server message.
/// Boxed in ServerMessage to reduce enum size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameResumedPayload {
    pub game_id: GameId,
    pub opponent: PlayerHandle,
    pub color: Color,
    pub time_control: TimeControl,
    /// FEN of the current position
    pub board: String,
    pub clocks: ClockSnapshot,
    pub next_to_move: Color,
}

/// Message types sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// No compatible opponent yet; the request is waiting in the queue
    MatchQueued,
    /// The queued request waited past the configured bound and was dropped
    WaitExpired,
    /// Paired into a new game
    GameStarted(GameStartedPayload),
    /// Reconnected while a game is still in progress (boxed to reduce enum size)
    GameResumed(Box<GameResumedPayload>),
    /// A move was accepted; sent to both participants
    MoveAccepted {
        /// FEN after the move
        board: String,
        clocks: ClockSnapshot,
        next_to_move: Color,
    },
    /// A move was rejected; sent to the mover only
    MoveRejected {
        reason: String,
        error_code: ErrorCode,
    },
    /// The game reached a terminal state
    GameEnded { result: GameResult },
    /// Chat line relayed from the opponent
    ChatText { from: PlayerHandle, body: String },
    /// Pong response to ping
    Pong,
    /// Error message
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error_code: Option<ErrorCode>,
    },
}
