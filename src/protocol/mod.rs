// Protocol module: message types, domain types, and validation

pub mod error_codes;
pub mod messages;
pub mod types;
pub mod validation;

// From error_codes
pub use error_codes::ErrorCode;

// From types
pub use types::{
    ClockSnapshot, Color, GameId, GameParameters, GameResult, MoveRecord, PlayerHandle,
    PromotionPiece, TerminationReason, TimeControl,
};

// From messages
pub use messages::{ClientMessage, GameResumedPayload, GameStartedPayload, ServerMessage};
