//! # Game Model
//!
//! The game record, its identifier, and the request payloads that carry
//! game fields over the wire.
//!
//! Validated types ([`NewGame`], [`GameChanges`]) can only be produced by the
//! `validation` module, so a store never sees a game with an empty title or
//! genre.

use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// Number of hex digits in a game identifier
pub const ID_LEN: usize = 24;

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_SALT: OnceLock<u64> = OnceLock::new();

fn process_salt() -> u64 {
    *PROCESS_SALT.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        ((u64::from(std::process::id()) << 8) | u64::from(nanos & 0xff)) & 0xff_ffff_ffff
    })
}

/// Opaque game identifier: 24 lowercase hex digits
///
/// Layout mirrors a document-database object id: 4 bytes of seconds since
/// the epoch, 5 bytes of process-unique data, 3 bytes of a wrapping counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Generate a fresh identifier
    #[must_use]
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let seconds = now.as_secs() & 0xffff_ffff;
        let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        Self(format!("{seconds:08x}{:010x}{counter:06x}", process_salt()))
    }

    /// Borrow the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GameId {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(GameError::InvalidIdentifier { id: s.to_string() })
        }
    }
}

impl TryFrom<String> for GameId {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

/// A stored game record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Store-assigned identifier
    pub id: GameId,
    /// Game title (never empty)
    pub title: String,
    /// Game genre (never empty)
    pub genre: String,
    /// Free-form release date, omitted from JSON when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Write counter, starts at zero
    pub version: u64,
}

impl Game {
    /// Build a record from a validated payload
    #[must_use]
    pub fn from_new(id: GameId, game: NewGame, version: u64) -> Self {
        Self {
            id,
            title: game.title,
            genre: game.genre,
            release_date: game.release_date,
            version,
        }
    }

    /// The mutable fields of this record
    #[must_use]
    pub fn document(&self) -> NewGame {
        NewGame {
            title: self.title.clone(),
            genre: self.genre.clone(),
            release_date: self.release_date.clone(),
        }
    }
}

/// Validated fields for a game that does not exist yet
///
/// Also the persisted document body of the SQL store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    title: String,
    genre: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_date: Option<String>,
}

impl NewGame {
    pub(crate) const fn new(title: String, genre: String, release_date: Option<String>) -> Self {
        Self {
            title,
            genre,
            release_date,
        }
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Genre
    #[must_use]
    pub fn genre(&self) -> &str {
        &self.genre
    }

    /// Release date, if any
    #[must_use]
    pub fn release_date(&self) -> Option<&str> {
        self.release_date.as_deref()
    }

    /// Apply changes in place
    pub fn apply(&mut self, changes: GameChanges) {
        self.title = changes.title;
        if let Some(genre) = changes.genre {
            self.genre = genre;
        }
        if let Some(release_date) = changes.release_date {
            self.release_date = Some(release_date);
        }
    }
}

/// Validated changes for an existing game
///
/// Title is always replaced; other fields only when supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameChanges {
    title: String,
    genre: Option<String>,
    release_date: Option<String>,
}

impl GameChanges {
    pub(crate) const fn new(
        title: String,
        genre: Option<String>,
        release_date: Option<String>,
    ) -> Self {
        Self {
            title,
            genre,
            release_date,
        }
    }

    /// New title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Apply to a stored record and bump its version
    pub fn apply_to(self, game: &mut Game) {
        game.title = self.title;
        if let Some(genre) = self.genre {
            game.genre = genre;
        }
        if let Some(release_date) = self.release_date {
            game.release_date = Some(release_date);
        }
        game.version += 1;
    }
}

/// A client-supplied field that is expected to hold a string
///
/// Values of any other JSON type are kept so validation can report them
/// instead of the body failing to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TextField {
    /// A JSON string
    Text(String),
    /// Any other JSON value
    Mistyped(serde_json::Value),
}

impl TextField {
    /// The string, if the field holds one
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Mistyped(_) => None,
        }
    }
}

impl From<String> for TextField {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for TextField {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Mistyped(value) => write!(f, "{value}"),
        }
    }
}

/// Raw game fields as received from a client
///
/// Body of `POST /api/game/create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameFields {
    /// Requested title
    #[serde(default)]
    pub title: Option<TextField>,
    /// Requested genre
    #[serde(default)]
    pub genre: Option<TextField>,
    /// Requested release date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<TextField>,
}

impl GameFields {
    /// Fields with a title and genre set
    #[must_use]
    pub fn new(title: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            title: Some(TextField::Text(title.into())),
            genre: Some(TextField::Text(genre.into())),
            release_date: None,
        }
    }

    /// Fields with only a title set
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(TextField::Text(title.into())),
            ..Self::default()
        }
    }

    /// Set the release date
    #[must_use]
    pub fn with_release_date(mut self, release_date: impl Into<String>) -> Self {
        self.release_date = Some(TextField::Text(release_date.into()));
        self
    }

    /// Set the genre
    #[must_use]
    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(TextField::Text(genre.into()));
        self
    }
}

/// Body of `PUT /api/game/update`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGameRequest {
    /// Target game id
    #[serde(default)]
    pub id: Option<TextField>,
    /// Replacement title
    #[serde(default)]
    pub title: Option<TextField>,
    /// Replacement genre
    #[serde(default)]
    pub genre: Option<TextField>,
    /// Replacement release date
    #[serde(default)]
    pub release_date: Option<TextField>,
}

/// Body of `DELETE /api/game/destroy`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyRequest {
    /// Target game id
    #[serde(default)]
    pub id: Option<TextField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_well_formed() {
        let id = GameId::generate();
        assert_eq!(id.as_str().len(), ID_LEN);
        assert!(id.as_str().parse::<GameId>().is_ok());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| GameId::generate()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let id: GameId = "5A9F1C2B3D4E5F6071829304".parse().unwrap();
        assert_eq!(id.as_str(), "5a9f1c2b3d4e5f6071829304");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["-1", "", "1234567890abcdefghijklmnopqrstuvwxyz", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let err = raw.parse::<GameId>().unwrap_err();
            assert!(matches!(err, GameError::InvalidIdentifier { .. }), "{raw}");
        }
    }

    #[test]
    fn test_game_json_omits_missing_release_date() {
        let game = Game::from_new(
            GameId::generate(),
            NewGame::new("Washington Games".into(), "Recreational".into(), None),
            0,
        );
        let value = serde_json::to_value(&game).unwrap();
        assert!(value.get("releaseDate").is_none());
        assert_eq!(value["version"], 0);
        assert_eq!(value["id"], game.id.as_str());
    }

    #[test]
    fn test_changes_keep_unsupplied_fields() {
        let mut game = Game::from_new(
            GameId::generate(),
            NewGame::new("Texas Games".into(), "Cattle".into(), Some("December 2016".into())),
            0,
        );
        GameChanges::new("Texas Games II".into(), None, None).apply_to(&mut game);

        assert_eq!(game.title, "Texas Games II");
        assert_eq!(game.genre, "Cattle");
        assert_eq!(game.release_date.as_deref(), Some("December 2016"));
        assert_eq!(game.version, 1);
    }

    #[test]
    fn test_fields_accept_camel_case_release_date() {
        let fields: GameFields =
            serde_json::from_str(r#"{"title":"A","genre":"B","releaseDate":"June 1987"}"#).unwrap();
        assert_eq!(fields.release_date, Some(TextField::from("June 1987")));
    }

    #[test]
    fn test_fields_keep_mistyped_values() {
        let fields: GameFields =
            serde_json::from_str(r#"{"title":5,"genre":"x","releaseDate":null}"#).unwrap();
        assert_eq!(fields.title, Some(TextField::Mistyped(serde_json::json!(5))));
        assert_eq!(fields.genre.as_ref().and_then(TextField::as_text), Some("x"));
        assert_eq!(fields.release_date, None);
    }
}
