#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines
)]

//! # Pawn Fish Server
//!
//! A lightweight, in-memory WebSocket pairing server for live chess games.
//!
//! Pairs waiting players by time control and color preference, runs each
//! game's clocks and termination rules, and fans completed results out to
//! downstream topics with bounded retry.

/// Chess rules engine wrapper (move legality, terminal detection)
pub mod chess;

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// WebSocket message protocol definitions
pub mod protocol;

/// Downstream result fan-out with bounded retry
pub mod publisher;

/// Retry backoff schedule
pub mod retry;

/// Session orchestration, matchmaking, and game state machines
pub mod server;

/// Persistence collaborator interface (in-memory implementation)
pub mod storage;

/// WebSocket connection handling
pub mod websocket;
