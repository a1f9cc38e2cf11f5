use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for structured error handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    InvalidMessage,
    BlankChatText,
    ChatTextTooLong,
    InvalidSquare,
    MessageTooLarge,

    // Matchmaking errors
    DuplicateRequest,

    // Game errors
    NotYourTurn,
    IllegalMove,
    GameCompleted,
    NoActiveGame,

    // Server errors
    InternalError,
}

impl ErrorCode {
    /// Returns a human-readable description of this error code.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidMessage => {
                "The message could not be parsed. Check the protocol documentation for the expected format."
            }
            Self::BlankChatText => "Chat messages must contain at least one non-whitespace character.",
            Self::ChatTextTooLong => "The chat message exceeds the configured length limit.",
            Self::InvalidSquare => {
                "Move squares must be algebraic coordinates from a1 to h8 (e.g. \"e2\")."
            }
            Self::MessageTooLarge => "The message exceeds the configured size limit.",
            Self::DuplicateRequest => {
                "A matchmaking request or active game already exists for this player."
            }
            Self::NotYourTurn => "It is the opponent's turn to move.",
            Self::IllegalMove => "The move is not legal in the current position.",
            Self::GameCompleted => "The game has already ended; no further moves are accepted.",
            Self::NoActiveGame => "No game is in progress for this player.",
            Self::InternalError => "An internal server error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_serialization_format() {
        let json = serde_json::to_string(&ErrorCode::NotYourTurn).unwrap();
        assert_eq!(json, "\"NOT_YOUR_TURN\"");

        let parsed: ErrorCode = serde_json::from_str("\"DUPLICATE_REQUEST\"").unwrap();
        assert_eq!(parsed, ErrorCode::DuplicateRequest);
    }

    #[test]
    fn test_descriptions_are_non_empty() {
        let codes = [
            ErrorCode::InvalidMessage,
            ErrorCode::BlankChatText,
            ErrorCode::ChatTextTooLong,
            ErrorCode::InvalidSquare,
            ErrorCode::MessageTooLarge,
            ErrorCode::DuplicateRequest,
            ErrorCode::NotYourTurn,
            ErrorCode::IllegalMove,
            ErrorCode::GameCompleted,
            ErrorCode::NoActiveGame,
            ErrorCode::InternalError,
        ];
        for code in codes {
            assert!(!code.description().is_empty(), "{code} lacks a description");
        }
    }
}
