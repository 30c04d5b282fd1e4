//! # GameKeep Core
//!
//! Core library for the GameKeep service: a small JSON API over a
//! collection of game records.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper
//! - `router` - Routing using matchit (radix trie)
//! - `route` - Route metadata
//! - `request` - HTTP request wrapper
//! - `middleware` - Request/response middleware system
//! - `handlers` - Game endpoints mounted on the server
//! - `model` - Game record, identifiers and request payloads
//! - `validation` - Structured validation errors and request validators
//! - `store` - Game store trait and in-memory implementation
//! - `database` - SQLx-backed game store (SQLite, PostgreSQL)
//! - `json` - JSON parsing with simd-json
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod handlers;
pub mod json;
pub mod middleware;
pub mod model;
pub mod request;
pub mod route;
pub mod router;
pub mod server;
pub mod store;
pub mod validation;

pub use database::{DatabasePool, SqlGameStore};
pub use error::{Error, GameError, GameResult, Result};
pub use handlers::{mount, SharedStore};
pub use json::to_json;
pub use middleware::{CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, TimingMiddleware};
pub use model::{
    DestroyRequest, Game, GameChanges, GameFields, GameId, NewGame, TextField, UpdateGameRequest,
};
pub use request::HttpRequest;
pub use route::RouteInfo;
pub use router::{Match, Method, Router};
pub use server::{Bytes, Handler, HandlerFuture, HttpResponse, Server, ServerConfig};
pub use store::{GameStore, MemoryGameStore};
pub use validation::{FieldError, ValidationCode, ValidationErrors, ValidationResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
