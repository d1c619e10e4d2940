//! Mock engine: owns the installed document and the HTTP listener.

use crate::config::Settings;
use crate::document::ApiDocument;
use crate::error::EngineError;
use crate::matcher::Matcher;
use crate::response::{synthesize, JSON_MEDIA_TYPE};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Body returned when no operation matches.
const NOT_FOUND_BODY: &str = r#"{"error":"Not found"}"#;

/// Serves mock responses for one installed document.
///
/// Calling [`MockEngine::start`] again replaces the document: the previous
/// listener is shut down and its accept loop awaited before the new listener
/// binds, so at most one listener ever serves traffic.
pub struct MockEngine {
    settings: Settings,
    running: Option<RunningServer>,
}

struct RunningServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Request counters for the current listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub requests_total: u64,
    pub requests_matched: u64,
    pub requests_unmatched: u64,
}

/// Immutable per-document state shared with connection tasks.
struct ServerState {
    document: ApiDocument,
    matcher: Matcher,
    log_matches: bool,
    log_unmatched: bool,
    requests_total: AtomicU64,
    requests_matched: AtomicU64,
    requests_unmatched: AtomicU64,
}

impl ServerState {
    fn new(document: ApiDocument, settings: &Settings) -> Self {
        let matcher = Matcher::new(&document);
        Self {
            document,
            matcher,
            log_matches: settings.log_matches,
            log_unmatched: settings.log_unmatched,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Build the response for a method and path. Never fails.
    fn respond(&self, method: &str, path: &str) -> Response<Full<Bytes>> {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        match self.matcher.find_match(&self.document, method, path) {
            Some(result) => {
                self.requests_matched.fetch_add(1, Ordering::Relaxed);
                if self.log_matches {
                    info!(
                        method = %method,
                        path = %path,
                        template = %result.template,
                        params = ?result.params,
                        "Request matched operation"
                    );
                }
                // Always 200, whichever response key supplied the body.
                json_response(StatusCode::OK, body_bytes(&synthesize(&result.operation)))
            }
            None => {
                self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
                if self.log_unmatched {
                    warn!(method = %method, path = %path, "No matching operation found");
                }
                json_response(StatusCode::NOT_FOUND, Bytes::from_static(NOT_FOUND_BODY.as_bytes()))
            }
        }
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_matched: self.requests_matched.load(Ordering::Relaxed),
            requests_unmatched: self.requests_unmatched.load(Ordering::Relaxed),
        }
    }
}

fn body_bytes(value: &Value) -> Bytes {
    match serde_json::to_vec(value) {
        Ok(body) => Bytes::from(body),
        Err(e) => {
            error!(error = %e, "Failed to serialize example body");
            Bytes::from_static(b"{}")
        }
    }
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_MEDIA_TYPE));
    response
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<ServerState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(state.respond(req.method().as_str(), req.uri().path()))
}

impl MockEngine {
    /// Create an engine that is not yet serving.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            running: None,
        }
    }

    /// Install a document and (re)start the listener.
    ///
    /// The previous listener is stopped before the new one binds, so if the
    /// bind fails nothing is serving afterwards. Returns the address bound.
    pub async fn start(&mut self, document: ApiDocument) -> Result<SocketAddr, EngineError> {
        self.stop().await;

        let addr = self.settings.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| EngineError::Bind { addr, source })?;
        let addr = listener
            .local_addr()
            .map_err(|source| EngineError::Bind { addr, source })?;

        let state = Arc::new(ServerState::new(document, &self.settings));
        if state.matcher.is_empty() {
            warn!(address = %addr, "Document has no path templates; every request will get 404");
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        info!(
            address = %addr,
            version = state.document.version().unwrap_or_default(),
            paths = state.matcher.len(),
            "Mock server running"
        );

        self.running = Some(RunningServer {
            addr,
            state,
            shutdown_tx,
            handle,
        });
        Ok(addr)
    }

    /// Stop serving. Open connections finish their current request.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.handle.await {
            error!(error = %e, "Mock listener task failed");
        }
        info!(address = %running.addr, "Mock server stopped");
    }

    /// Whether a listener is active.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Address of the active listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// The installed document.
    pub fn document(&self) -> Option<&ApiDocument> {
        self.running.as_ref().map(|r| &r.state.document)
    }

    /// Request counters since the last start.
    pub fn stats(&self) -> EngineStats {
        self.running
            .as_ref()
            .map(|r| r.state.stats())
            .unwrap_or_default()
    }

}

impl Drop for MockEngine {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

/// Resolves once shutdown is signalled or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // The borrow guard must not be held across the caller's awaits.
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let conn_rx = shutdown_rx.clone();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(serve_connection(stream, peer, state, conn_rx.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept error");
                    }
                }
            }
            _ = shutdown_requested(&mut shutdown_rx) => {
                debug!("Accept loop shutting down");
                break;
            }
        }
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    state: Arc<ServerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));
    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(peer = %peer, error = %e, "Connection error");
            }
        }
        _ = shutdown_requested(&mut shutdown_rx) => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!(peer = %peer, error = %e, "Connection error during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::sanitize;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};

    fn make_doc(value: Value) -> ApiDocument {
        let raw = serde_json::from_value(value).unwrap();
        sanitize(&raw).unwrap()
    }

    fn pets_doc() -> ApiDocument {
        make_doc(json!({
            "openapi": "3.0.0",
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {"content": {"application/json": {"example": [{"id": 1}]}}}
                        }
                    }
                },
                "/pets/{id}": {
                    "get": {
                        "responses": {
                            "200": {"content": {"application/json": {"example": {"id": 42, "name": "Rex"}}}},
                            "404": {"content": {"application/json": {"example": {"error": "gone"}}}}
                        }
                    },
                    "delete": {
                        "responses": {
                            "404": {"content": {"application/json": {"example": {"deleted": false}}}}
                        }
                    },
                    "put": {"responses": {"200": {"description": "no content"}}}
                }
            }
        }))
    }

    fn test_settings() -> Settings {
        Settings {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            ..Settings::default()
        }
    }

    async fn read_body(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_respond_matched() {
        let state = ServerState::new(pets_doc(), &test_settings());
        let response = state.respond("GET", "/pets/42");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(read_body(response).await, json!({"id": 42, "name": "Rex"}));
    }

    #[tokio::test]
    async fn test_non_200_key_still_returns_200() {
        // Surprising but intended: the selected key only decides the body.
        let state = ServerState::new(pets_doc(), &test_settings());
        let response = state.respond("DELETE", "/pets/42");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, json!({"deleted": false}));
    }

    #[tokio::test]
    async fn test_no_example_gives_empty_object() {
        let state = ServerState::new(pets_doc(), &test_settings());
        let response = state.respond("PUT", "/pets/1");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_body(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_unmatched_is_404() {
        let state = ServerState::new(pets_doc(), &test_settings());

        let response = state.respond("GET", "/owners");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(read_body(response).await, json!({"error": "Not found"}));

        let response = state.respond("POST", "/pets");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert_eq!(
            state.stats(),
            EngineStats {
                requests_total: 2,
                requests_matched: 0,
                requests_unmatched: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_serves_over_http() {
        let mut engine = MockEngine::new(test_settings());
        let addr = engine.start(pets_doc()).await.unwrap();
        assert!(engine.is_running());

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{addr}/pets/42?verbose=true"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["content-type"], "application/json");
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({"id": 42, "name": "Rex"}));

        let response = client
            .get(format!("http://{addr}/pets/42/toys"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);
        assert_eq!(response.text().await.unwrap(), r#"{"error":"Not found"}"#);

        assert_eq!(engine.stats().requests_total, 2);
        engine.stop().await;
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_restart_replaces_document() {
        let mut engine = MockEngine::new(test_settings());
        let first = engine.start(pets_doc()).await.unwrap();

        let replacement = make_doc(json!({
            "swagger": "2.0",
            "paths": {"/owners": {"get": {"responses": {"200": {
                "content": {"application/json": {"example": {"owner": "sam"}}}
            }}}}}
        }));
        let second = engine.start(replacement).await.unwrap();
        assert_eq!(engine.document().and_then(|d| d.version()), Some("2.0"));

        let client = reqwest::Client::new();
        let body: Value = client
            .get(format!("http://{second}/owners"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"owner": "sam"}));

        let response = client.get(format!("http://{second}/pets")).send().await.unwrap();
        assert_eq!(response.status(), 404);

        if first != second {
            // The old listener is gone.
            assert!(tokio::net::TcpStream::connect(first).await.is_err());
        }
        engine.stop().await;
    }

    #[tokio::test]
    async fn test_stop_with_idle_keep_alive_connection() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut engine = MockEngine::new(test_settings());
        let addr = engine.start(pets_doc()).await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /pets HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(String::from_utf8_lossy(&buf[..n]).starts_with("HTTP/1.1 200"));

        // The connection stays open and idle while the engine stops.
        tokio::time::timeout(std::time::Duration::from_secs(5), engine.stop())
            .await
            .unwrap();
        assert!(!engine.is_running());

        // The idle connection is closed by the graceful shutdown.
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut engine = MockEngine::new(Settings {
            port,
            ..test_settings()
        });
        let err = engine.start(pets_doc()).await.unwrap_err();
        assert!(matches!(err, EngineError::Bind { .. }));
        assert!(!engine.is_running());
    }
}
