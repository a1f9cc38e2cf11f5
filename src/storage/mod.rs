//! Persistence collaborator interface.
//!
//! The session core calls into this at game start and completion only. The
//! storage technology behind it is not the core's concern; the in-memory
//! backend is the only one shipped here and is what tests run against.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

use crate::protocol::{GameId, GameResult, MoveRecord, PlayerHandle, TimeControl};

/// A game as the persistence collaborator sees it.
#[derive(Debug, Clone)]
pub struct StoredGame {
    pub id: GameId,
    pub white: PlayerHandle,
    pub black: PlayerHandle,
    pub time_control: TimeControl,
    pub moves: Vec<MoveRecord>,
    pub result: Option<GameResult>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl StoredGame {
    #[must_use]
    pub fn started(
        id: GameId,
        white: PlayerHandle,
        black: PlayerHandle,
        time_control: TimeControl,
    ) -> Self {
        Self {
            id,
            white,
            black,
            time_control,
            moves: Vec::new(),
            result: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }
}

/// Narrow persistence interface consumed by the session core.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Record a freshly paired game before the first move.
    async fn save_starter_game(&self, game: StoredGame) -> Result<()>;

    /// Attach the final move history and result to a completed game.
    async fn update_completed_game(
        &self,
        id: GameId,
        moves: Vec<MoveRecord>,
        result: GameResult,
    ) -> Result<()>;

    async fn find_by_id(&self, id: &GameId) -> Result<Option<StoredGame>>;

    async fn list_games_for_user(&self, handle: &PlayerHandle) -> Result<Vec<StoredGame>>;

    /// Opponents this player has completed games against.
    async fn list_partners_for(&self, handle: &PlayerHandle) -> Result<Vec<PlayerHandle>>;
}

/// In-memory game store.
#[derive(Debug, Default)]
pub struct InMemoryGameStore {
    games: DashMap<GameId, StoredGame>,
}

impl InMemoryGameStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GameStore for InMemoryGameStore {
    async fn save_starter_game(&self, game: StoredGame) -> Result<()> {
        self.games.insert(game.id, game);
        Ok(())
    }

    async fn update_completed_game(
        &self,
        id: GameId,
        moves: Vec<MoveRecord>,
        result: GameResult,
    ) -> Result<()> {
        let Some(mut game) = self.games.get_mut(&id) else {
            anyhow::bail!("game {id} was never saved");
        };
        game.moves = moves;
        game.result = Some(result);
        game.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn find_by_id(&self, id: &GameId) -> Result<Option<StoredGame>> {
        Ok(self.games.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_games_for_user(&self, handle: &PlayerHandle) -> Result<Vec<StoredGame>> {
        let mut games: Vec<StoredGame> = self
            .games
            .iter()
            .filter(|entry| entry.white == *handle || entry.black == *handle)
            .map(|entry| entry.value().clone())
            .collect();
        games.sort_by_key(|game| game.started_at);
        Ok(games)
    }

    async fn list_partners_for(&self, handle: &PlayerHandle) -> Result<Vec<PlayerHandle>> {
        let mut partners: Vec<PlayerHandle> = self
            .games
            .iter()
            .filter(|entry| entry.result.is_some())
            .filter_map(|entry| {
                if entry.white == *handle {
                    Some(entry.black.clone())
                } else if entry.black == *handle {
                    Some(entry.white.clone())
                } else {
                    None
                }
            })
            .collect();
        partners.sort();
        partners.dedup();
        Ok(partners)
    }
}
