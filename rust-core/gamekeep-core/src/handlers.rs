//! # Game Endpoints
//!
//! Binds the game operations to HTTP routes and maps their outcomes onto
//! status codes and JSON bodies.
//!
//! | Route | Operation |
//! |---|---|
//! | `POST /api/game/create` | [`create`] |
//! | `GET /api/game/get` | [`list`] |
//! | `PUT /api/game/update` | [`update`] |
//! | `DELETE /api/game/destroy` | [`destroy`] |
//! | `DELETE /api/game/destroy/{id}` | [`destroy`] |

use crate::error::{GameError, GameResult, Result};
use crate::json::parse_body;
use crate::model::{DestroyRequest, Game, GameFields, TextField, UpdateGameRequest};
use crate::request::HttpRequest;
use crate::router::{Match, Method};
use crate::server::{Handler, HandlerFuture, HttpResponse, Server};
use crate::store::GameStore;
use crate::validation::{require_id, validate_identifier, validate_update};
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, warn};

/// Shared store handle passed to every handler
pub type SharedStore = Arc<dyn GameStore>;

/// Register every game route on `server`
///
/// # Errors
///
/// Returns `Error::InvalidRoutePattern` if a route conflicts with one
/// already registered.
pub fn mount(server: &mut Server, store: SharedStore) -> Result<()> {
    server.add_route(
        Method::Post,
        "/api/game/create",
        "game.create",
        body_handler(&store, |store, fields: GameFields| async move {
            respond(create(store.as_ref(), fields).await)
        }),
    )?;
    let list_store = store.clone();
    let list_all: Handler = Arc::new(move |_req: &HttpRequest, _matched: &Match| -> HandlerFuture {
        let store = list_store.clone();
        Box::pin(async move { respond(list(store.as_ref()).await) })
    });
    server.add_route(Method::Get, "/api/game/get", "game.list", list_all)?;
    server.add_route(
        Method::Put,
        "/api/game/update",
        "game.update",
        body_handler(&store, |store, payload: UpdateGameRequest| async move {
            respond(update(store.as_ref(), payload).await)
        }),
    )?;
    server.add_route(
        Method::Delete,
        "/api/game/destroy",
        "game.destroy",
        body_handler(&store, |store, payload: DestroyRequest| async move {
            respond(destroy(store.as_ref(), payload.id).await)
        }),
    )?;

    let by_path: Handler = Arc::new(move |_req: &HttpRequest, matched: &Match| -> HandlerFuture {
        let store = store.clone();
        let id = matched.param("id").map(TextField::from);
        Box::pin(async move { respond(destroy(store.as_ref(), id).await) })
    });
    server.add_route(
        Method::Delete,
        "/api/game/destroy/{id}",
        "game.destroy",
        by_path,
    )
}

/// Build a handler that decodes the request body into `T` before calling `op`
///
/// Mistyped fields are left to validation; only a body that is not JSON, or
/// cannot take the request's shape at all, is answered with 400.
fn body_handler<T, F, Fut>(store: &SharedStore, op: F) -> Handler
where
    T: DeserializeOwned + Default + Send + 'static,
    F: Fn(SharedStore, T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = HttpResponse> + Send + 'static,
{
    let store = store.clone();
    let op = Arc::new(op);
    Arc::new(move |req: &HttpRequest, matched: &Match| -> HandlerFuture {
        let store = store.clone();
        let op = op.clone();
        let body: Option<Bytes> = req.body_bytes().map(Bytes::copy_from_slice);
        let route = matched.name;
        Box::pin(async move {
            match parse_body::<T>(body.as_deref()) {
                Ok(payload) => op(store, payload).await,
                Err(e) => {
                    warn!(route, error = %e, "Rejected request body");
                    HttpResponse::error(400, e)
                }
            }
        })
    })
}

/// Create a game from raw fields
///
/// # Errors
///
/// Returns `GameError::Validation` when `title` or `genre` is missing.
pub async fn create(store: &dyn GameStore, fields: GameFields) -> GameResult<Game> {
    store.create(fields).await
}

/// Every stored game
///
/// # Errors
///
/// Returns `GameError::Store` if the backend fails.
pub async fn list(store: &dyn GameStore) -> GameResult<Vec<Game>> {
    store.list_all().await
}

/// Replace the title (and optionally genre and release date) of a game
///
/// # Errors
///
/// Returns `GameError::MissingField` for a missing title or id,
/// `GameError::InvalidIdentifier` for a malformed id, and
/// `GameError::NotFound` when no game carries the id.
pub async fn update(store: &dyn GameStore, payload: UpdateGameRequest) -> GameResult<Game> {
    let (raw_id, changes) = validate_update(payload)?;
    let id = validate_identifier(&raw_id)?;
    store.apply(&id, changes).await
}

/// Delete a game, by body or path id
///
/// # Errors
///
/// Returns `GameError::MissingField` for a missing id,
/// `GameError::InvalidIdentifier` for a malformed or non-string id, and
/// `GameError::NotFound` when no game carries the id.
pub async fn destroy(store: &dyn GameStore, raw_id: Option<TextField>) -> GameResult<String> {
    let raw_id = require_id(raw_id)?;
    let id = validate_identifier(&raw_id)?;
    let title = store.delete_by_id(&id).await?;
    Ok(removal_message(&title))
}

/// Message returned after a successful delete
#[must_use]
pub fn removal_message(title: &str) -> String {
    format!("{title} was removed from the database")
}

/// Outcome of a handler, rendered as a response
trait IntoResponse {
    fn into_response(self) -> HttpResponse;
}

impl IntoResponse for Game {
    fn into_response(self) -> HttpResponse {
        HttpResponse::json_value(200, &self)
    }
}

impl IntoResponse for Vec<Game> {
    fn into_response(self) -> HttpResponse {
        HttpResponse::json_value(200, &self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> HttpResponse {
        HttpResponse::json_value(200, &json!({ "success": self }))
    }
}

fn respond<T: IntoResponse>(result: GameResult<T>) -> HttpResponse {
    match result {
        Ok(value) => value.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Map a failed operation onto a response
///
/// Create-time validation failures keep their structure under `message`;
/// every other client error is a flat `error` string.
#[must_use]
pub fn error_response(err: &GameError) -> HttpResponse {
    match err {
        GameError::Validation(errors) => {
            warn!(error = %errors, "Game validation failed");
            HttpResponse::json_value(422, &json!({ "message": errors.to_value() }))
        }
        other if other.is_client_error() => {
            warn!(error = %other, "Game operation rejected");
            HttpResponse::error(422, other)
        }
        other => {
            error!(error = %other, "Game store failure");
            HttpResponse::error(500, other)
        }
    }
}
