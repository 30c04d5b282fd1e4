//! # Game Store
//!
//! Persistence abstraction over a single collection of game documents.
//!
//! Implementations provide the single-document primitives; field validation
//! is shared through the provided `create` and `update_by_id` methods so
//! every backend enforces the same schema.
//!
//! - [`MemoryGameStore`] - `HashMap` behind an `RwLock`, clone-friendly
//! - [`crate::database::SqlGameStore`] - SQLite / PostgreSQL via SQLx

use crate::error::{Error, GameError, GameResult};
use crate::model::{Game, GameChanges, GameFields, GameId, NewGame};
use crate::validation::{validate_changes, validate_create};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// A collection of game documents
///
/// Each operation touches at most one document and is atomic on its own.
#[async_trait]
pub trait GameStore: Send + Sync {
    /// Persist a validated game under a fresh id with version `0`
    async fn insert(&self, game: NewGame) -> GameResult<Game>;

    /// Every stored game, in no particular order
    async fn list_all(&self) -> GameResult<Vec<Game>>;

    /// Look up a single game
    async fn find_by_id(&self, id: &GameId) -> GameResult<Game>;

    /// Apply validated changes and bump the version
    async fn apply(&self, id: &GameId, changes: GameChanges) -> GameResult<Game>;

    /// Remove a game, returning its former title
    async fn delete_by_id(&self, id: &GameId) -> GameResult<String>;

    /// Remove every game, returning how many were removed
    async fn clear(&self) -> GameResult<u64>;

    /// Release backend resources; later operations may fail
    async fn close(&self) {}

    /// Validate raw fields and insert
    async fn create(&self, fields: GameFields) -> GameResult<Game> {
        let game = validate_create(fields)?;
        self.insert(game).await
    }

    /// Validate raw replacement fields and apply them
    async fn update_by_id(&self, id: &GameId, fields: GameFields) -> GameResult<Game> {
        let changes = validate_changes(fields)?;
        self.apply(id, changes).await
    }
}

fn lock_poisoned(operation: &str) -> GameError {
    GameError::Store(Error::Database {
        message: format!("game store lock poisoned during {operation}"),
    })
}

/// In-memory game store backed by a `HashMap`
///
/// Clones share the same collection.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<RwLock<HashMap<GameId, Game>>>,
}

impl MemoryGameStore {
    /// Create a new empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored games
    #[must_use]
    pub fn len(&self) -> usize {
        self.games.read().map(|g| g.len()).unwrap_or_default()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryGameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGameStore")
            .field("len", &self.len())
            .finish()
    }
}

#[async_trait]
impl GameStore for MemoryGameStore {
    async fn insert(&self, game: NewGame) -> GameResult<Game> {
        let mut games = self.games.write().map_err(|_| lock_poisoned("insert"))?;
        let mut id = GameId::generate();
        while games.contains_key(&id) {
            id = GameId::generate();
        }
        let game = Game::from_new(id.clone(), game, 0);
        games.insert(id, game.clone());
        debug!(id = %game.id, title = %game.title, "Game created");
        Ok(game)
    }

    async fn list_all(&self) -> GameResult<Vec<Game>> {
        let games = self.games.read().map_err(|_| lock_poisoned("list"))?;
        Ok(games.values().cloned().collect())
    }

    async fn find_by_id(&self, id: &GameId) -> GameResult<Game> {
        let games = self.games.read().map_err(|_| lock_poisoned("find"))?;
        games.get(id).cloned().ok_or_else(|| GameError::NotFound {
            id: id.to_string(),
        })
    }

    async fn apply(&self, id: &GameId, changes: GameChanges) -> GameResult<Game> {
        let mut games = self.games.write().map_err(|_| lock_poisoned("update"))?;
        let game = games.get_mut(id).ok_or_else(|| GameError::NotFound {
            id: id.to_string(),
        })?;
        changes.apply_to(game);
        debug!(id = %game.id, version = game.version, "Game updated");
        Ok(game.clone())
    }

    async fn delete_by_id(&self, id: &GameId) -> GameResult<String> {
        let mut games = self.games.write().map_err(|_| lock_poisoned("delete"))?;
        let game = games.remove(id).ok_or_else(|| GameError::NotFound {
            id: id.to_string(),
        })?;
        debug!(id = %game.id, "Game deleted");
        Ok(game.title)
    }

    async fn clear(&self) -> GameResult<u64> {
        let mut games = self.games.write().map_err(|_| lock_poisoned("clear"))?;
        let removed = games.len() as u64;
        games.clear();
        Ok(removed)
    }
}
