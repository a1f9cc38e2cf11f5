// Chess rules capability consumed by the game state machine.

pub mod engine;

pub use engine::{BoardEngine, EngineError};
