//! # JSON Serialization Module
//!
//! Request bodies are parsed with simd-json, responses are written with
//! serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse JSON bytes to a typed value using simd-json
///
/// simd-json parses in place, so the buffer is clobbered.
///
/// # Errors
///
/// Returns `Error::MalformedBody` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::MalformedBody {
        reason: e.to_string(),
    })
}

/// Parse an optional request body
///
/// A missing or blank body decodes as `T::default()`, so a bodyless request
/// behaves like `{}`.
///
/// # Errors
///
/// Returns `Error::MalformedBody` if a non-blank body is not valid JSON for `T`
pub fn parse_body<T: DeserializeOwned + Default>(body: Option<&[u8]>) -> Result<T> {
    match body {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => {
            parse_json_bytes(&mut bytes.to_vec())
        }
        _ => Ok(T::default()),
    }
}

/// Serialize a value to JSON string
///
/// # Errors
///
/// Returns `Error::Json` if serialization fails
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DestroyRequest, GameFields, TextField};

    #[test]
    fn test_parse_body_object() {
        let json = br#"{"title": "Lambda Games", "genre": "Computer Science"}"#;
        let fields: GameFields = parse_body(Some(json)).unwrap();
        assert_eq!(fields, GameFields::new("Lambda Games", "Computer Science"));
    }

    #[test]
    fn test_parse_body_keeps_mistyped_id() {
        let req: DestroyRequest = parse_body(Some(br#"{"id": -1}"#)).unwrap();
        assert_eq!(req.id, Some(TextField::Mistyped(serde_json::json!(-1))));
    }

    #[test]
    fn test_parse_json_bytes() {
        let mut bytes = br#"{"id": "5a9f1c2b3d4e5f6071829304"}"#.to_vec();
        let req: DestroyRequest = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(req.id, Some("5a9f1c2b3d4e5f6071829304".into()));
    }

    #[test]
    fn test_parse_body_blank_is_default() {
        let req: DestroyRequest = parse_body(None).unwrap();
        assert_eq!(req, DestroyRequest::default());

        let req: DestroyRequest = parse_body(Some(b"  \n")).unwrap();
        assert_eq!(req, DestroyRequest::default());
    }

    #[test]
    fn test_to_json() {
        let fields = GameFields::new("Oregon Games", "Recreational");
        let json = to_json(&fields).unwrap();
        assert!(json.contains("Oregon Games"));
        assert!(!json.contains("releaseDate"));
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<GameFields> = parse_body(Some(b"not valid json"));
        assert!(matches!(result, Err(Error::MalformedBody { .. })));

        let result: Result<GameFields> = parse_body(Some(br#""California Games""#));
        assert!(matches!(result, Err(Error::MalformedBody { .. })));
    }
}
