//! # GameKeep Server
//!
//! Serves the game API over HTTP. Configuration comes from `gamekeep.toml`
//! and `GAMEKEEP_*` environment variables.

mod config;
mod logging;

use std::sync::Arc;

use anyhow::{Context, Result};
use gamekeep_core::{
    mount, CorsMiddleware, GameStore, LoggingMiddleware, MemoryGameStore, Server, SharedStore,
    SqlGameStore, TimingMiddleware,
};
use tracing::info;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    logging::init_logging(&config);

    let store = open_store(&config).await?;
    let server = build_server(&config, store.clone())?;

    let served = server.serve().await.context("server terminated");
    store.close().await;
    info!("Server stopped");
    served
}

/// Open the store selected by `database_url`.
async fn open_store(config: &AppConfig) -> Result<SharedStore> {
    if config.uses_memory_store() {
        info!("Using in-memory game store");
        return Ok(Arc::new(MemoryGameStore::new()));
    }

    let store = SqlGameStore::connect(&config.database_url, Some(config.max_connections))
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    info!(backend = store.pool().backend(), "Using SQL game store");
    Ok(Arc::new(store))
}

/// Assemble the server with middleware and game routes.
fn build_server(config: &AppConfig, store: SharedStore) -> Result<Server> {
    let mut server = Server::new(config.server_config()?);
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(TimingMiddleware::new());
    if let Some(origin) = &config.cors_origin {
        server.add_middleware(CorsMiddleware::new().allow_origin(origin.clone()));
    }

    mount(&mut server, store).context("failed to register routes")?;
    Ok(server)
}
