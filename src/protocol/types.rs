use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for games
pub type GameId = Uuid;

/// Authenticated player handle.
///
/// Authentication happens upstream; by the time a connection reaches the
/// core, the handle is trusted and unique per player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerHandle(String);

impl PlayerHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

/// Side of the board a player occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// Supported time-control profiles.
///
/// Each profile maps to a fixed per-side budget; there is no per-move
/// increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Bullet,
    Blitz,
    Rapid,
    Classic,
}

impl TimeControl {
    /// Per-side clock budget for this profile.
    #[must_use]
    pub const fn base_time(self) -> Duration {
        match self {
            Self::Bullet => Duration::from_secs(60),
            Self::Blitz => Duration::from_secs(300),
            Self::Rapid => Duration::from_secs(900),
            Self::Classic => Duration::from_secs(5400),
        }
    }

    /// All profiles, in ascending budget order.
    pub const ALL: [Self; 4] = [Self::Bullet, Self::Blitz, Self::Rapid, Self::Classic];
}

impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullet => f.write_str("bullet"),
            Self::Blitz => f.write_str("blitz"),
            Self::Rapid => f.write_str("rapid"),
            Self::Classic => f.write_str("classic"),
        }
    }
}

/// Piece a pawn promotes to on reaching the last rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromotionPiece {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionPiece {
    /// UCI suffix character for this promotion.
    #[must_use]
    pub const fn uci_char(self) -> char {
        match self {
            Self::Queen => 'q',
            Self::Rook => 'r',
            Self::Bishop => 'b',
            Self::Knight => 'n',
        }
    }
}

/// Matchmaking parameters supplied with a `MatchRequest`.
///
/// Used only while the request waits in the queue; discarded once paired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameParameters {
    pub preferred_color: Option<Color>,
    pub time_control: TimeControl,
    pub requested_at: chrono::DateTime<chrono::Utc>,
}

impl GameParameters {
    #[must_use]
    pub fn new(preferred_color: Option<Color>, time_control: TimeControl) -> Self {
        Self {
            preferred_color,
            time_control,
            requested_at: chrono::Utc::now(),
        }
    }
}

/// One accepted move, as appended to a game's history.
///
/// Records are append-only; ordering within the history is the game truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub promotion: Option<PromotionPiece>,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl MoveRecord {
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>, promotion: Option<PromotionPiece>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion,
            received_at: chrono::Utc::now(),
        }
    }

    /// The move in UCI notation (e.g. "e2e4", "a7a8q").
    #[must_use]
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(piece) => format!("{}{}{}", self.from, self.to, piece.uci_char()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

/// Rule outcome that ended a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Checkmate,
    Stalemate,
    FiftyMoveRule,
    ThreefoldRepetition,
    InsufficientMaterial,
    TimeForfeit,
    Abandonment,
}

/// Final outcome of a completed game. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: GameId,
    pub winner: Option<Color>,
    pub reason: TerminationReason,
}

/// Remaining clock budgets, in milliseconds, as sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_ms: u64,
    pub black_ms: u64,
}
