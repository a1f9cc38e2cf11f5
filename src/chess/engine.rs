//! Rules engine wrapper around shakmaty.
//!
//! The session core treats chess rules as a black-box capability: apply a
//! move, report the terminal state. Everything shakmaty-specific stays in
//! this module.

use std::collections::HashMap;

use shakmaty::{
    fen::Fen, uci::UciMove, CastlingMode, Chess, EnPassantMode, Position,
};
use thiserror::Error;

use crate::protocol::validation::is_valid_square;
use crate::protocol::{Color, PromotionPiece, TerminationReason};

/// Errors that can occur while applying a move or loading a position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Invalid or unplayable FEN string.
    #[error("invalid FEN: {0}")]
    InvalidFen(String),

    /// A square was not an algebraic coordinate.
    #[error("invalid square in move: {0}")]
    InvalidSquare(String),

    /// The move is not legal in the current position.
    #[error("illegal move: {0}")]
    IllegalMove(String),
}

impl From<shakmaty::Color> for Color {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Self::White,
            shakmaty::Color::Black => Self::Black,
        }
    }
}

/// A chess position with move application and terminal-state detection.
///
/// Tracks position occurrences itself so threefold repetition can be
/// reported without the caller replaying history.
#[derive(Debug, Clone)]
pub struct BoardEngine {
    position: Chess,
    /// Occurrence count per repetition key (board, turn, castling, en passant).
    repetitions: HashMap<String, u32>,
}

impl BoardEngine {
    /// Standard starting position.
    #[must_use]
    pub fn new() -> Self {
        let position = Chess::default();
        let mut repetitions = HashMap::new();
        repetitions.insert(repetition_key(&position), 1);
        Self {
            position,
            repetitions,
        }
    }

    /// Build a position from a FEN string. Repetition history starts fresh.
    pub fn from_fen(fen: &str) -> Result<Self, EngineError> {
        let parsed: Fen = fen
            .parse()
            .map_err(|_| EngineError::InvalidFen(fen.to_string()))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|_| EngineError::InvalidFen(fen.to_string()))?;
        let mut repetitions = HashMap::new();
        repetitions.insert(repetition_key(&position), 1);
        Ok(Self {
            position,
            repetitions,
        })
    }

    /// FEN of the current position.
    #[must_use]
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// Whose turn it is to move.
    #[must_use]
    pub fn turn(&self) -> Color {
        self.position.turn().into()
    }

    /// Validate and apply a move given as coordinate squares.
    pub fn apply_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<PromotionPiece>,
    ) -> Result<(), EngineError> {
        if !is_valid_square(from) {
            return Err(EngineError::InvalidSquare(from.to_string()));
        }
        if !is_valid_square(to) {
            return Err(EngineError::InvalidSquare(to.to_string()));
        }

        let uci_text = match promotion {
            Some(piece) => format!("{from}{to}{}", piece.uci_char()),
            None => format!("{from}{to}"),
        };
        let uci: UciMove = uci_text
            .parse()
            .map_err(|_| EngineError::IllegalMove(uci_text.clone()))?;
        let m = uci
            .to_move(&self.position)
            .map_err(|_| EngineError::IllegalMove(uci_text.clone()))?;

        if !self.position.is_legal(&m) {
            return Err(EngineError::IllegalMove(uci_text));
        }

        self.position = self
            .position
            .clone()
            .play(&m)
            .map_err(|_| EngineError::IllegalMove(uci_text))?;

        *self
            .repetitions
            .entry(repetition_key(&self.position))
            .or_insert(0) += 1;

        Ok(())
    }

    /// Evaluate terminal conditions in fixed priority order:
    /// checkmate > stalemate > fifty-move rule > threefold repetition >
    /// insufficient material. `None` means the game continues.
    #[must_use]
    pub fn terminal_state(&self) -> Option<(TerminationReason, Option<Color>)> {
        if self.position.is_checkmate() {
            // The side to move is mated, so the other side wins.
            return Some((TerminationReason::Checkmate, Some(self.turn().opposite())));
        }
        if self.position.is_stalemate() {
            return Some((TerminationReason::Stalemate, None));
        }
        if self.position.halfmoves() >= 100 {
            return Some((TerminationReason::FiftyMoveRule, None));
        }
        let occurrences = self
            .repetitions
            .get(&repetition_key(&self.position))
            .copied()
            .unwrap_or(0);
        if occurrences >= 3 {
            return Some((TerminationReason::ThreefoldRepetition, None));
        }
        if self.position.is_insufficient_material() {
            return Some((TerminationReason::InsufficientMaterial, None));
        }
        None
    }
}

impl Default for BoardEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Position identity for repetition counting: the FEN without its move
/// counters.
fn repetition_key(position: &Chess) -> String {
    let fen = Fen::from_position(position.clone(), EnPassantMode::Legal).to_string();
    fen.split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}
