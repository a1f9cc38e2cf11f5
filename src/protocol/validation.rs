use thiserror::Error;

use super::error_codes::ErrorCode;

/// Why a chat body was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatTextError {
    #[error("chat text must not be blank")]
    Blank,
    #[error("chat text exceeds {max} characters")]
    TooLong { max: usize },
}

impl ChatTextError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Blank => ErrorCode::BlankChatText,
            Self::TooLong { .. } => ErrorCode::ChatTextTooLong,
        }
    }
}

/// Validate a chat line before relaying it to the opponent.
pub fn validate_chat_body(body: &str, max_length: usize) -> Result<(), ChatTextError> {
    if body.trim().is_empty() {
        return Err(ChatTextError::Blank);
    }
    if body.chars().count() > max_length {
        return Err(ChatTextError::TooLong { max: max_length });
    }
    Ok(())
}

/// Check that a square is an algebraic coordinate from a1 to h8.
///
/// The rules engine rejects anything unplayable anyway; this keeps obviously
/// malformed input from reaching it.
#[must_use]
pub fn is_valid_square(square: &str) -> bool {
    let mut chars = square.chars();
    let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
        return false;
    };
    ('a'..='h').contains(&file) && ('1'..='8').contains(&rank)
}
