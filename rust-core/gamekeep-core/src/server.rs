//! # HTTP Server
//!
//! HTTP server built on Hyper and Tokio.
//! Implements graceful shutdown with signal handling.
//!
//! ## Key Features
//!
//! - Async request handling with Tokio runtime, one task per connection
//! - Graceful shutdown on Ctrl-C or SIGTERM, or on any caller-supplied future
//! - `OPTIONS` preflight answered for every routed path
//! - Connection keep-alive support
//! - Network-free request execution for tests

use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::request::HttpRequest;
use crate::router::{Match, Method, Router};
use http_body_util::Full;
pub use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// HTTP response produced by handlers and middleware
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl HttpResponse {
    /// `204 No Content` with an empty body and no content type
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: String::new(),
            ..Self::default()
        }
    }

    /// Create a JSON response from a pre-encoded body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Serialize `value` into a JSON response with the given status
    ///
    /// Falls back to a 500 if the value cannot be encoded.
    #[must_use]
    pub fn json_value<T: Serialize>(status: u16, value: &T) -> Self {
        match crate::json::to_json(value) {
            Ok(body) => Self::json(body).with_status(status),
            Err(e) => {
                error!("Failed to encode response: {}", e);
                Self::error(500, "Internal Server Error")
            }
        }
    }

    /// `{"error": message}` with the given status
    #[must_use]
    pub fn error(status: u16, message: impl std::fmt::Display) -> Self {
        Self::json(json!({ "error": message.to_string() }).to_string()).with_status(status)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_ascii_lowercase(), value.to_string());
        }
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the body is not valid JSON.
    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Convert to hyper Response
    fn into_hyper(self) -> Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if !self.content_type.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.content_type) {
                headers.insert(CONTENT_TYPE, value);
            }
        }
        for (k, v) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(v),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}

/// Future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HttpResponse> + Send>>;

/// Handler function type (async)
///
/// Handlers copy what they need out of the request before returning the
/// future, so the future owns its data.
pub type Handler = Arc<dyn Fn(&HttpRequest, &Match) -> HandlerFuture + Send + Sync>;

/// HTTP server
pub struct Server {
    config: ServerConfig,
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            router: Router::new(),
            handlers: Vec::new(),
            middleware: MiddlewareChain::new(),
        }
    }

    /// Server configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middleware.add(middleware);
    }

    /// Add a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the route cannot be registered.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        name: &'static str,
        handler: Handler,
    ) -> Result<()> {
        self.router.add_route(method, path, name)?;
        self.handlers.push(handler);
        Ok(())
    }

    /// Bind a listening socket on the configured address
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the socket cannot be bound.
    pub async fn listen(&self) -> Result<TcpListener> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;

        socket.listen(1024).map_err(bind_error)
    }

    /// Start the server with graceful shutdown on Ctrl-C or SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if binding or accepting fails.
    pub async fn serve(&self) -> Result<()> {
        let listener = self.listen().await?;
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve connections from `listener` until `shutdown` resolves
    ///
    /// In-flight connections get up to `shutdown_timeout` to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting a connection fails.
    pub async fn serve_with_shutdown<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!("Server listening on http://{}", listener.local_addr()?);

        let router = Arc::new(self.router.clone());
        let handlers = Arc::new(self.handlers.clone());
        let middleware = Arc::new(self.middleware.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let router = router.clone();
                    let handlers = handlers.clone();
                    let middleware = middleware.clone();
                    let active = active.clone();

                    active.fetch_add(1, Ordering::Relaxed);
                    tokio::task::spawn(async move {
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service_fn(move |req| {
                                let router = router.clone();
                                let handlers = handlers.clone();
                                let middleware = middleware.clone();
                                async move {
                                    let method = req.method().clone();
                                    let path = req.uri().path().to_string();
                                    let version = format!("{:?}", req.version());

                                    let response = handle_request(
                                        req,
                                        &router,
                                        &handlers,
                                        &middleware,
                                        remote_addr,
                                        max_body_size,
                                    )
                                    .await;

                                    info!("    {} - \"{} {} {}\" {}",
                                        remote_addr,
                                        method,
                                        path,
                                        version,
                                        response.status()
                                    );
                                    Ok::<_, std::convert::Infallible>(response)
                                }
                            }))
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            error!(
                open = active.load(Ordering::Relaxed),
                "Shutdown timeout elapsed with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> HttpResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return HttpResponse::error(413, "Payload Too Large");
            }
        }
        let mut req = HttpRequest::new(method, path, headers, body);
        req.set_header("x-client-ip", "test");

        process_request(&mut req, &self.router, &self.handlers, &self.middleware).await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match terminate_signal() {
            Ok(signal) => signal.await,
            Err(e) => {
                error!("Failed to install SIGTERM signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
    }
}

/// Install the SIGTERM handler now and resolve on the next delivery
#[cfg(unix)]
fn terminate_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    Ok(async move {
        term.recv().await;
    })
}

/// Answer `OPTIONS` with the methods routed for the path
///
/// Unrouted paths get the usual 404.
fn preflight(req: &HttpRequest, router: &Router, middleware: &MiddlewareChain) -> HttpResponse {
    let allowed = router.allowed_methods(&req.path);
    if allowed.is_empty() {
        return HttpResponse::error(404, "Not Found");
    }

    match middleware.run_before(req) {
        MiddlewareResult::Continue => {
            let allow = allowed
                .iter()
                .chain(std::iter::once(&Method::Options))
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            HttpResponse::no_content().with_header("Allow", &allow)
        }
        MiddlewareResult::Respond(resp) => resp,
    }
}

/// Core request processing logic (network agnostic)
async fn process_request(
    req: &mut HttpRequest,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
) -> HttpResponse {
    if req.header("x-request-id").is_none() {
        let request_id = generate_request_id();
        req.set_header("x-request-id", &request_id);
    }

    let mut response = if req.method == Method::Options {
        preflight(req, router, middleware)
    } else {
        match router.match_route(req.method, &req.path) {
            Ok(matched) => match middleware.run_before(req) {
                MiddlewareResult::Continue => match handlers.get(matched.handler_id) {
                    Some(handler) => handler(req, &matched).await,
                    None => {
                        error!(handler_id = matched.handler_id, "Route has no handler");
                        HttpResponse::error(500, "Internal Server Error")
                    }
                },
                MiddlewareResult::Respond(resp) => resp,
            },
            Err(_) => HttpResponse::error(404, "Not Found"),
        }
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    middleware.run_after(req, &mut response);
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    router: &Router,
    handlers: &[Handler],
    middleware: &MiddlewareChain,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> Response<Full<Bytes>> {
    let mut request = match HttpRequest::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(e @ Error::PayloadTooLarge { .. }) => {
            return HttpResponse::error(413, e).into_hyper();
        }
        Err(Error::RouteNotFound { .. }) => {
            return HttpResponse::error(404, "Not Found").into_hyper();
        }
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return HttpResponse::error(400, "Bad Request").into_hyper();
        }
    };

    request.set_header("x-client-ip", &remote_addr.ip().to_string());
    process_request(&mut request, router, handlers, middleware)
        .await
        .into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_server() -> Server {
        let mut server = Server::default();
        let handler: Handler = Arc::new(|req: &HttpRequest, matched: &Match| -> HandlerFuture {
            let path = req.path.clone();
            let id = matched.param("id").map(str::to_string);
            Box::pin(async move { HttpResponse::json_value(200, &json!({ "path": path, "id": id })) })
        });
        server
            .add_route(Method::Get, "/echo/{id}", "echo", handler)
            .unwrap();
        server
    }

    #[test]
    fn test_http_response_json() {
        let resp = HttpResponse::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_http_response_error_body() {
        let resp = HttpResponse::error(422, "title is required");
        assert_eq!(resp.status, 422);
        assert_eq!(resp.body_json().unwrap()["error"], "title is required");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let resp = HttpResponse::json("{}").with_header("X-Request-Id", "abc");
        assert_eq!(resp.header("x-request-id"), Some("abc"));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert!(config.keep_alive);
    }

    #[tokio::test]
    async fn test_request_routes_to_handler() {
        let server = echo_server();
        let resp = server
            .test_request(Method::Get, "/echo/42", HashMap::new(), None)
            .await;

        assert_eq!(resp.status, 200);
        let body = resp.body_json().unwrap();
        assert_eq!(body["id"], "42");
        assert!(resp.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let server = echo_server();
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "req-1".to_string());

        let resp = server
            .test_request(Method::Get, "/echo/1", headers, None)
            .await;
        assert_eq!(resp.header("x-request-id"), Some("req-1"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = echo_server();
        let resp = server
            .test_request(Method::Post, "/echo/1", HashMap::new(), None)
            .await;

        assert_eq!(resp.status, 404);
        assert_eq!(resp.body_json().unwrap()["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_options_lists_allowed_methods() {
        let mut server = echo_server();
        server.add_middleware(crate::middleware::CorsMiddleware::new());
        let resp = server
            .test_request(Method::Options, "/echo/7", HashMap::new(), None)
            .await;

        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
        assert_eq!(resp.header("allow"), Some("GET, OPTIONS"));
        assert_eq!(resp.header("access-control-allow-origin"), Some("*"));
        assert!(resp.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_options_on_unknown_path_is_404() {
        let server = echo_server();
        let resp = server
            .test_request(Method::Options, "/missing", HashMap::new(), None)
            .await;
        assert_eq!(resp.status, 404);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_resolves_terminate_signal() {
        let signal = terminate_signal().unwrap();
        let status = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), signal)
            .await
            .expect("SIGTERM was not observed");
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let mut server = echo_server();
        server.set_max_body_size(4);
        let resp = server
            .test_request(
                Method::Get,
                "/echo/1",
                HashMap::new(),
                Some(Bytes::from_static(b"0123456789")),
            )
            .await;
        assert_eq!(resp.status, 413);
    }
}
