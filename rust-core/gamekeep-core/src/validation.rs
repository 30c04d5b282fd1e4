//! # Validation Module
//!
//! Structured validation errors and the request validators that run before
//! any store call.
//!
//! - [`validate_create`] - title and genre present and non-empty
//! - [`validate_update`] - id and title present and non-empty
//! - [`validate_identifier`] - identifier syntax, checked before any lookup

use crate::error::{GameError, GameResult};
use crate::model::{GameChanges, GameFields, GameId, NewGame, TextField, UpdateGameRequest};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;

/// Error name reported to clients for create-time validation failures
pub const VALIDATION_ERROR_NAME: &str = "ValidationError";

/// Error code for categorizing validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    /// Required field is missing
    Required,
    /// Required field is present but empty
    Empty,
    /// Field holds a JSON value that is not a string
    InvalidType,
}

/// A single validation error for a specific field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field name (e.g., "title")
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error code
    pub code: ValidationCode,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: ValidationCode) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }

    /// Create a "required field" error
    pub fn required(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} is required"),
            field: field_str,
            code: ValidationCode::Required,
        }
    }

    /// Create an "empty field" error
    pub fn empty(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must not be empty"),
            field: field_str,
            code: ValidationCode::Empty,
        }
    }

    /// Create a "not a string" error
    pub fn invalid_type(field: impl Into<String>) -> Self {
        let field_str = field.into();
        Self {
            message: format!("{field_str} must be a string"),
            field: field_str,
            code: ValidationCode::InvalidType,
        }
    }
}

/// Collection of validation errors
///
/// Allows aggregating multiple field errors for a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// List of field-level errors
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field error
    pub fn add(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    /// Add a required field error
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(FieldError::required(field));
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether a given field failed
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Client-facing description: `{name, message, errors}`
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({
            "name": VALIDATION_ERROR_NAME,
            "message": self.to_string(),
            "errors": self.errors,
        })
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game validation failed")?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { ", " };
            write!(f, "{sep}{}: {}", error.field, error.message)?;
        }
        Ok(())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = std::result::Result<T, ValidationErrors>;

fn check_required(errors: &mut ValidationErrors, field: &str, value: Option<&TextField>) {
    match value {
        None => errors.add_required(field),
        Some(TextField::Mistyped(_)) => errors.add(FieldError::invalid_type(field)),
        Some(TextField::Text(text)) if text.is_empty() => errors.add(FieldError::empty(field)),
        Some(TextField::Text(_)) => {}
    }
}

fn check_optional(errors: &mut ValidationErrors, field: &str, value: Option<&TextField>) {
    if let Some(TextField::Mistyped(_)) = value {
        errors.add(FieldError::invalid_type(field));
    }
}

fn into_text(value: Option<TextField>) -> Option<String> {
    match value {
        Some(TextField::Text(text)) => Some(text),
        _ => None,
    }
}

/// Validate a create payload
///
/// Collects every failing field so the client sees all of them at once.
///
/// # Errors
///
/// Returns the collected errors when `title` or `genre` is missing, empty
/// or not a string, or when `releaseDate` is not a string.
pub fn validate_create(payload: GameFields) -> ValidationResult<NewGame> {
    let mut errors = ValidationErrors::new();
    check_required(&mut errors, "title", payload.title.as_ref());
    check_required(&mut errors, "genre", payload.genre.as_ref());
    check_optional(&mut errors, "releaseDate", payload.release_date.as_ref());

    match (into_text(payload.title), into_text(payload.genre)) {
        (Some(title), Some(genre)) if errors.is_empty() => {
            Ok(NewGame::new(title, genre, into_text(payload.release_date)))
        }
        _ => Err(errors),
    }
}

/// Reject a supplied optional field that is not a string
fn optional_text(value: Option<TextField>, field: &'static str) -> GameResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(TextField::Text(text)) => Ok(Some(text)),
        Some(TextField::Mistyped(_)) => Err(GameError::InvalidField { field }),
    }
}

/// Validate replacement fields for an existing game
///
/// # Errors
///
/// Returns `GameError::MissingField` when `title` is missing or empty, or
/// when a supplied `genre` is empty, and `GameError::InvalidField` when a
/// supplied field is not a string.
pub fn validate_changes(payload: GameFields) -> GameResult<GameChanges> {
    let title = match payload.title {
        Some(TextField::Text(title)) if !title.is_empty() => title,
        Some(TextField::Mistyped(_)) => return Err(GameError::InvalidField { field: "title" }),
        _ => return Err(GameError::MissingField { field: "title" }),
    };
    let genre = optional_text(payload.genre, "genre")?;
    if genre.as_deref() == Some("") {
        return Err(GameError::MissingField { field: "genre" });
    }
    let release_date = optional_text(payload.release_date, "releaseDate")?;
    Ok(GameChanges::new(title, genre, release_date))
}

/// Validate an update payload
///
/// Existence of the target is not checked here.
///
/// # Errors
///
/// Returns `GameError::MissingField` for a missing title or id, and the
/// errors of [`validate_changes`] and [`require_id`].
pub fn validate_update(payload: UpdateGameRequest) -> GameResult<(String, GameChanges)> {
    let changes = validate_changes(GameFields {
        title: payload.title,
        genre: payload.genre,
        release_date: payload.release_date,
    })?;
    let id = require_id(payload.id)?;
    Ok((id, changes))
}

/// Require a non-empty raw id
///
/// # Errors
///
/// Returns `GameError::MissingField` when the id is absent or empty, and
/// `GameError::InvalidIdentifier` when it is not a string.
pub fn require_id(id: Option<TextField>) -> GameResult<String> {
    match id {
        Some(TextField::Text(id)) if !id.is_empty() => Ok(id),
        Some(TextField::Mistyped(value)) => Err(GameError::InvalidIdentifier {
            id: value.to_string(),
        }),
        _ => Err(GameError::MissingField { field: "id" }),
    }
}

/// Check identifier syntax
///
/// # Errors
///
/// Returns `GameError::InvalidIdentifier` for anything that is not
/// 24 hex digits.
pub fn validate_identifier(raw: &str) -> GameResult<GameId> {
    raw.parse()
}
