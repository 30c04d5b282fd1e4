//! # Error Handling
//!
//! Centralized error types for GameKeep core.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Two layers live here:
//!
//! - [`Error`] - runtime failures (binding, routing, transport, database)
//! - [`GameError`] - outcomes of game operations that are reported to clients

use crate::validation::ValidationErrors;
use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for game operations
pub type GameResult<T> = std::result::Result<T, GameError>;

/// Core error types for the GameKeep runtime
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Router failed to match the requested path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {message}")]
    Database {
        /// Error message from database
        message: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// Request body could not be decoded
    #[error("Malformed request body: {reason}")]
    MalformedBody {
        /// Decoder message
        reason: String,
    },
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

/// Outcome of a failed game operation
///
/// Every variant except [`GameError::Store`] is a client-facing condition.
#[derive(Error, Debug)]
pub enum GameError {
    /// Required fields missing or empty on create
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Required field missing on update or delete
    #[error("{field} is required")]
    MissingField {
        /// Name of the missing field
        field: &'static str,
    },

    /// Supplied field is not a string
    #[error("{field} must be a string")]
    InvalidField {
        /// Name of the mistyped field
        field: &'static str,
    },

    /// Identifier does not follow the identifier syntax
    #[error("'{id}' is not a valid game id")]
    InvalidIdentifier {
        /// The rejected identifier
        id: String,
    },

    /// Identifier is well formed but no game carries it
    #[error("no game found with id {id}")]
    NotFound {
        /// The identifier that was looked up
        id: String,
    },

    /// Storage backend failed
    #[error(transparent)]
    Store(#[from] Error),
}

impl GameError {
    /// Whether this error was caused by the client rather than the backend
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl From<ValidationErrors> for GameError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<sqlx::Error> for GameError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.into())
    }
}
