//! # Route Metadata
//!
//! Information kept about a single registered route.

use crate::router::HandlerId;

/// Route metadata
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Unique handler identifier
    pub handler_id: HandlerId,
    /// Path pattern as registered (e.g., "/api/game/destroy/{id}")
    pub path_pattern: String,
    /// Short operation name used in logs (e.g., "game.destroy")
    pub name: &'static str,
}

impl RouteInfo {
    /// Create a new `RouteInfo` from a path pattern
    #[must_use]
    pub fn new(handler_id: HandlerId, path: &str, name: &'static str) -> Self {
        Self {
            handler_id,
            path_pattern: path.to_string(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_info_keeps_pattern_and_name() {
        let info = RouteInfo::new(3, "/api/game/destroy/{id}", "game.destroy");
        assert_eq!(info.handler_id, 3);
        assert_eq!(info.path_pattern, "/api/game/destroy/{id}");
        assert_eq!(info.name, "game.destroy");
    }
}
