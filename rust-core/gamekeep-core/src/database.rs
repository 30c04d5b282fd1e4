//! # Database Module
//!
//! Async database connectivity with SQLx for PostgreSQL and SQLite, and the
//! document-style game store built on top of it.
//!
//! Games are kept in one table; the mutable fields live in a JSON document
//! column next to the id and version:
//!
//! ```text
//! games(id TEXT PRIMARY KEY, version BIGINT NOT NULL, document TEXT NOT NULL)
//! ```

use crate::error::{Error, GameError, GameResult, Result};
use crate::model::{Game, GameChanges, GameId, NewGame};
use crate::store::GameStore;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

/// Default pool size when none is configured
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Read-then-conditional-write rounds before an update gives up
const MAX_UPDATE_ATTEMPTS: u32 = 16;

/// Database connection pool supporting multiple backends
#[derive(Clone, Debug)]
pub enum DatabasePool {
    /// SQLite connection pool
    Sqlite(SqlitePool),
    /// PostgreSQL connection pool
    Postgres(PgPool),
}

impl DatabasePool {
    /// Connect to the backend named by the URL scheme
    ///
    /// `sqlite:` URLs open SQLite, `postgres://` and `postgresql://` open
    /// PostgreSQL.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` for unknown schemes or connection failures.
    pub async fn connect(url: &str, max_connections: Option<u32>) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Self::connect_sqlite(url, max_connections).await
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::connect_postgres(url, max_connections).await
        } else {
            Err(Error::Database {
                message: format!("Unsupported database URL: {url}"),
            })
        }
    }

    /// Connect to a SQLite database
    ///
    /// In-memory databases are pinned to a single connection that is never
    /// recycled, since each SQLite connection would otherwise see its own
    /// empty database.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pool = DatabasePool::connect_sqlite("sqlite::memory:", None).await?;
    /// let pool = DatabasePool::connect_sqlite("sqlite:games.db?mode=rwc", Some(20)).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection fails.
    pub async fn connect_sqlite(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
        };

        let pool = options.connect(url).await.map_err(|e| Error::Database {
            message: format!("SQLite connection failed: {e}"),
        })?;

        Ok(Self::Sqlite(pool))
    }

    /// Connect to a PostgreSQL database
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pool = DatabasePool::connect_postgres("postgres://localhost/games", None).await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection fails.
    pub async fn connect_postgres(url: &str, max_connections: Option<u32>) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .connect(url)
            .await
            .map_err(|e| Error::Database {
                message: format!("PostgreSQL connection failed: {e}"),
            })?;

        Ok(Self::Postgres(pool))
    }

    /// Execute a statement that doesn't return rows
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the statement fails.
    pub async fn execute(&self, query: &str) -> Result<u64> {
        let result = match self {
            Self::Sqlite(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
            Self::Postgres(pool) => sqlx::query(query).execute(pool).await.map(|r| r.rows_affected()),
        };
        result.map_err(|e| Error::Database {
            message: format!("Query error: {e}"),
        })
    }

    /// Backend name for logging
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::Postgres(_) => "postgres",
        }
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        match self {
            Self::Sqlite(pool) => pool.close().await,
            Self::Postgres(pool) => pool.close().await,
        }
    }
}

/// Statements for one SQL dialect
struct Statements {
    insert: &'static str,
    select_all: &'static str,
    select_one: &'static str,
    update: &'static str,
    delete: &'static str,
    clear: &'static str,
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS games (\
    id TEXT PRIMARY KEY, \
    version BIGINT NOT NULL, \
    document TEXT NOT NULL)";

static SQLITE: Statements = Statements {
    insert: "INSERT INTO games (id, version, document) VALUES (?, ?, ?)",
    select_all: "SELECT id, version, document FROM games",
    select_one: "SELECT id, version, document FROM games WHERE id = ?",
    update: "UPDATE games SET document = ?, version = version + 1 \
        WHERE id = ? AND version = ? RETURNING version",
    delete: "DELETE FROM games WHERE id = ? RETURNING document",
    clear: "DELETE FROM games",
};

static POSTGRES: Statements = Statements {
    insert: "INSERT INTO games (id, version, document) VALUES ($1, $2, $3)",
    select_all: "SELECT id, version, document FROM games",
    select_one: "SELECT id, version, document FROM games WHERE id = $1",
    update: "UPDATE games SET document = $1, version = version + 1 \
        WHERE id = $2 AND version = $3 RETURNING version",
    delete: "DELETE FROM games WHERE id = $1 RETURNING document",
    clear: "DELETE FROM games",
};

/// Game store persisted through a [`DatabasePool`]
#[derive(Clone, Debug)]
pub struct SqlGameStore {
    pool: DatabasePool,
}

impl SqlGameStore {
    /// Wrap a pool and make sure the `games` table exists
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the table cannot be created.
    pub async fn new(pool: DatabasePool) -> Result<Self> {
        pool.execute(CREATE_TABLE).await?;
        info!(backend = pool.backend(), "Game store ready");
        Ok(Self { pool })
    }

    /// Connect by URL and prepare the table
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` on connection or schema failures.
    pub async fn connect(url: &str, max_connections: Option<u32>) -> Result<Self> {
        Self::new(DatabasePool::connect(url, max_connections).await?).await
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    fn statements(&self) -> &'static Statements {
        match self.pool {
            DatabasePool::Sqlite(_) => &SQLITE,
            DatabasePool::Postgres(_) => &POSTGRES,
        }
    }
}

fn encode_document(game: &NewGame) -> GameResult<String> {
    serde_json::to_string(game).map_err(|e| GameError::Store(e.into()))
}

fn decode_document(document: &str) -> GameResult<NewGame> {
    serde_json::from_str(document).map_err(|e| GameError::Store(e.into()))
}

fn decode_version(version: i64) -> GameResult<u64> {
    u64::try_from(version).map_err(|_| {
        GameError::Store(Error::Database {
            message: format!("negative version {version} in games table"),
        })
    })
}

fn decode_game(id: String, version: i64, document: &str) -> GameResult<Game> {
    let id = id.parse::<GameId>().map_err(|_| {
        GameError::Store(Error::Database {
            message: format!("malformed id {id} in games table"),
        })
    })?;
    Ok(Game::from_new(id, decode_document(document)?, decode_version(version)?))
}

/// Convert SQLite row to a game
fn sqlite_row_to_game(row: &SqliteRow) -> GameResult<Game> {
    let id: String = row.try_get("id")?;
    let version: i64 = row.try_get("version")?;
    let document: String = row.try_get("document")?;
    decode_game(id, version, &document)
}

/// Convert PostgreSQL row to a game
fn pg_row_to_game(row: &PgRow) -> GameResult<Game> {
    let id: String = row.try_get("id")?;
    let version: i64 = row.try_get("version")?;
    let document: String = row.try_get("document")?;
    decode_game(id, version, &document)
}

fn not_found(id: &GameId) -> GameError {
    GameError::NotFound { id: id.to_string() }
}

#[async_trait]
impl GameStore for SqlGameStore {
    async fn insert(&self, game: NewGame) -> GameResult<Game> {
        let id = GameId::generate();
        let document = encode_document(&game)?;
        let sql = self.statements().insert;

        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(id.as_str())
                    .bind(0_i64)
                    .bind(&document)
                    .execute(pool)
                    .await?;
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query(sql)
                    .bind(id.as_str())
                    .bind(0_i64)
                    .bind(&document)
                    .execute(pool)
                    .await?;
            }
        }

        debug!(id = %id, title = %game.title(), "Game created");
        Ok(Game::from_new(id, game, 0))
    }

    async fn list_all(&self) -> GameResult<Vec<Game>> {
        let sql = self.statements().select_all;
        match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let rows: Vec<SqliteRow> = sqlx::query(sql).fetch_all(pool).await?;
                rows.iter().map(sqlite_row_to_game).collect()
            }
            DatabasePool::Postgres(pool) => {
                let rows: Vec<PgRow> = sqlx::query(sql).fetch_all(pool).await?;
                rows.iter().map(pg_row_to_game).collect()
            }
        }
    }

    async fn find_by_id(&self, id: &GameId) -> GameResult<Game> {
        let sql = self.statements().select_one;
        let game = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                let row: Option<SqliteRow> =
                    sqlx::query(sql).bind(id.as_str()).fetch_optional(pool).await?;
                row.as_ref().map(sqlite_row_to_game).transpose()?
            }
            DatabasePool::Postgres(pool) => {
                let row: Option<PgRow> =
                    sqlx::query(sql).bind(id.as_str()).fetch_optional(pool).await?;
                row.as_ref().map(pg_row_to_game).transpose()?
            }
        };
        game.ok_or_else(|| not_found(id))
    }

    async fn apply(&self, id: &GameId, changes: GameChanges) -> GameResult<Game> {
        let sql = self.statements().update;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.find_by_id(id).await?;
            let read_version = i64::try_from(current.version).map_err(|_| {
                GameError::Store(Error::Database {
                    message: format!("version {} out of range", current.version),
                })
            })?;
            let mut document = current.document();
            document.apply(changes.clone());
            let encoded = encode_document(&document)?;

            // No row back: the game changed or vanished since the read.
            let version: Option<i64> = match &self.pool {
                DatabasePool::Sqlite(pool) => {
                    sqlx::query_scalar(sql)
                        .bind(&encoded)
                        .bind(id.as_str())
                        .bind(read_version)
                        .fetch_optional(pool)
                        .await?
                }
                DatabasePool::Postgres(pool) => {
                    sqlx::query_scalar(sql)
                        .bind(&encoded)
                        .bind(id.as_str())
                        .bind(read_version)
                        .fetch_optional(pool)
                        .await?
                }
            };

            if let Some(version) = version {
                let version = decode_version(version)?;
                debug!(id = %id, version, attempt, "Game updated");
                return Ok(Game::from_new(id.clone(), document, version));
            }
            debug!(id = %id, attempt, "Concurrent write detected, retrying update");
        }

        Err(GameError::Store(Error::Database {
            message: format!("update of game {id} kept conflicting with concurrent writes"),
        }))
    }

    async fn delete_by_id(&self, id: &GameId) -> GameResult<String> {
        let sql = self.statements().delete;
        let document: Option<String> = match &self.pool {
            DatabasePool::Sqlite(pool) => {
                sqlx::query_scalar(sql)
                    .bind(id.as_str())
                    .fetch_optional(pool)
                    .await?
            }
            DatabasePool::Postgres(pool) => {
                sqlx::query_scalar(sql)
                    .bind(id.as_str())
                    .fetch_optional(pool)
                    .await?
            }
        };

        let document = decode_document(&document.ok_or_else(|| not_found(id))?)?;
        debug!(id = %id, "Game deleted");
        Ok(document.title().to_string())
    }

    async fn clear(&self) -> GameResult<u64> {
        Ok(self.pool.execute(self.statements().clear).await?)
    }

    async fn close(&self) {
        debug!(backend = self.pool.backend(), "Closing game store");
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GameFields;

    async fn memory_store() -> SqlGameStore {
        SqlGameStore::connect("sqlite::memory:", None).await.unwrap()
    }

    #[tokio::test]
    async fn test_sqlite_memory_connection() {
        let pool = DatabasePool::connect_sqlite("sqlite::memory:", None).await;
        assert!(pool.is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_url() {
        let result = DatabasePool::connect("mongodb://localhost/test", None).await;
        assert!(matches!(result, Err(Error::Database { .. })));
    }

    #[tokio::test]
    async fn test_table_is_created_once() {
        let store = memory_store().await;
        let again = SqlGameStore::new(store.pool().clone()).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_document_round_trip() {
        let store = memory_store().await;
        let fields = GameFields::new("Vancouver Games", "Chill").with_release_date("March 2018");
        let created = store.create(fields).await.unwrap();

        let found = store.find_by_id(&created.id).await.unwrap();
        assert_eq!(found, created);
        assert_eq!(found.version, 0);
    }

    #[tokio::test]
    async fn test_update_returns_incremented_version() {
        let store = memory_store().await;
        let created = store
            .create(GameFields::new("Oregon Games", "Recreational"))
            .await
            .unwrap();

        let fields = GameFields {
            title: Some("Oregon Games Deluxe".into()),
            ..Default::default()
        };
        let updated = store.update_by_id(&created.id, fields).await.unwrap();

        assert_eq!(updated.version, 1);
        assert_eq!(updated.genre, "Recreational");
        assert_eq!(store.find_by_id(&created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_delete_returns_title() {
        let store = memory_store().await;
        let created = store
            .create(GameFields::new("Texas Games", "Cattle"))
            .await
            .unwrap();

        assert_eq!(store.delete_by_id(&created.id).await.unwrap(), "Texas Games");
        assert!(matches!(
            store.delete_by_id(&created.id).await,
            Err(GameError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_counts_rows() {
        let store = memory_store().await;
        store.create(GameFields::new("A", "B")).await.unwrap();
        store.create(GameFields::new("C", "D")).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_store_rejects_queries() {
        let store = memory_store().await;
        store.close().await;

        assert!(matches!(store.list_all().await, Err(GameError::Store(_))));
    }
}
