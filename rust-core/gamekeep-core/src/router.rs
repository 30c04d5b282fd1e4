//! # Router
//!
//! Radix-trie based router using `matchit`, one trie per HTTP method.
//!
//! ## Features
//!
//! - Path parameter extraction (`/api/game/destroy/{id}`)
//! - Per-method route tables, so the same path can serve several methods
//! - Allowed-method lookup for `OPTIONS` preflight requests

use crate::error::{Error, Result};
use crate::route::RouteInfo;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;
use tracing::debug;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP OPTIONS, answered by the server itself and never routed
    Options,
}

impl Method {
    /// Map a hyper method, `None` for methods the API never serves
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with extracted parameters
#[derive(Debug, Clone)]
pub struct Match {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Operation name of the matched route
    pub name: &'static str,
    /// Extracted path parameters
    pub params: HashMap<String, String>,
}

impl Match {
    /// Get a path parameter by name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Per-method storage for routes
#[derive(Clone)]
struct MethodRoutes {
    /// Matchit router for path matching
    router: MatchitRouter<HandlerId>,
    /// Route metadata for this method
    routes: Vec<RouteInfo>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            router: MatchitRouter::new(),
            routes: Vec::new(),
        }
    }
}

/// HTTP router using radix trie
#[derive(Clone)]
pub struct Router {
    /// Per-method routers for efficient matching
    method_routes: HashMap<Method, MethodRoutes>,
    /// Counter for generating handler IDs
    next_handler_id: HandlerId,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self {
            method_routes: HashMap::new(),
            next_handler_id: 0,
        }
    }

    /// Register a route with the given method and path pattern
    ///
    /// Handler IDs are assigned sequentially across all methods, starting
    /// at zero.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern is malformed or
    /// conflicts with an existing route
    pub fn add_route(&mut self, method: Method, path: &str, name: &'static str) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;
        let route_info = RouteInfo::new(handler_id, path, name);

        let method_routes = self
            .method_routes
            .entry(method)
            .or_insert_with(MethodRoutes::new);

        method_routes
            .router
            .insert(path, handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            method = %method,
            path = %route_info.path_pattern,
            name,
            handler_id,
            "Route registered"
        );
        method_routes.routes.push(route_info);
        self.next_handler_id += 1;

        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no matching route exists
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let method_routes = self.method_routes.get(&method).ok_or_else(not_found)?;
        let matched = method_routes.router.at(path).map_err(|_| not_found())?;
        let handler_id = *matched.value;

        let route_info = method_routes
            .routes
            .iter()
            .find(|r| r.handler_id == handler_id)
            .ok_or_else(not_found)?;

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Ok(Match {
            handler_id,
            name: route_info.name,
            params,
        })
    }

    /// Methods with a route matching `path`, in declaration order
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .method_routes
            .iter()
            .filter(|(_, routes)| routes.router.at(path).is_ok())
            .map(|(method, _)| *method)
            .collect();
        methods.sort();
        methods
    }
}
