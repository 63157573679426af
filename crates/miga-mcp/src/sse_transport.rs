//! SSE transport for the MCP server.
//!
//! Multi-tenant transport: each client opens `GET /sse`, receives an
//! `endpoint` event naming its message-post URL, and delivers requests
//! via `POST /message?sessionId=<id>`. Responses are pushed back over
//! the open event stream. Every session and message request must carry
//! the pre-shared `X-MCP-API-Key` header; multi-tenancy beyond that is
//! expressed only through the `business_id` tool argument, which is a
//! known limitation of this design rather than a security boundary.

use crate::error::McpError;
use crate::protocol::JsonRpcRequest;
use crate::server::McpServer;
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response, Sse},
    routing::{get, post},
};
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

/// Header carrying the pre-shared key.
pub const API_KEY_HEADER: &str = "x-mcp-api-key";

/// One event pushed into a session's output stream.
#[derive(Debug, Clone)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Tracks open sessions by identifier so follow-up messages can be
/// routed to the correct stream. Owned by the transport state, never a
/// module-level global; the mutex is required because entries are
/// removed from a `Drop` impl when a stream closes.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, mpsc::Sender<SseEvent>>>,
}

impl SessionRegistry {
    fn insert(&self, id: &str, tx: mpsc::Sender<SseEvent>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(id.to_string(), tx);
        }
    }

    fn remove(&self, id: &str) -> bool {
        self.sessions
            .lock()
            .map(|mut sessions| sessions.remove(id).is_some())
            .unwrap_or(false)
    }

    fn sender(&self, id: &str) -> Option<mpsc::Sender<SseEvent>> {
        self.sessions
            .lock()
            .ok()
            .and_then(|sessions| sessions.get(id).cloned())
    }

    /// Number of currently open sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Whether no session is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared state for the SSE transport.
pub struct SseServerState {
    server: McpServer,
    api_key: String,
    sessions: SessionRegistry,
}

impl SseServerState {
    /// Create transport state around a protocol server and the
    /// server-side pre-shared key.
    pub fn new(server: McpServer, api_key: impl Into<String>) -> Self {
        Self {
            server,
            api_key: api_key.into(),
            sessions: SessionRegistry::default(),
        }
    }

    /// The session registry (exposed for tests and introspection).
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}

/// Query parameters for the message endpoint.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Create the SSE transport router.
pub fn create_router(state: Arc<SseServerState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/sse", get(handle_sse))
        .route("/message", post(handle_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Exact-match API key check, before any session or tool logic runs.
fn authorize(state: &SseServerState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());

    if presented == Some(state.api_key.as_str()) {
        Ok(())
    } else {
        let err = McpError::Unauthorized("invalid or missing API key".to_string());
        Err((StatusCode::UNAUTHORIZED, err.to_string()).into_response())
    }
}

/// Liveness probe; deliberately unauthenticated.
async fn handle_root() -> &'static str {
    "miga-mcp SSE transport is running"
}

/// Open a new session stream.
async fn handle_sse(
    State(state): State<Arc<SseServerState>>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let (event_tx, mut event_rx) = mpsc::channel::<SseEvent>(100);

    state.sessions.insert(&session_id, event_tx);
    tracing::info!(session = %session_id, "SSE session connected");

    let guard_state = state.clone();
    let endpoint = format!("/message?sessionId={session_id}");

    let stream = async_stream::stream! {
        // Removes the registry entry when the client disconnects and
        // the stream is dropped.
        let _guard = SessionGuard {
            state: guard_state,
            session_id: session_id.clone(),
        };

        yield Ok::<_, Infallible>(
            axum::response::sse::Event::default()
                .event("endpoint")
                .data(endpoint),
        );

        while let Some(event) = event_rx.recv().await {
            yield Ok(axum::response::sse::Event::default()
                .event(event.event)
                .data(event.data));
        }
    };

    Sse::new(stream)
        .keep_alive(
            axum::response::sse::KeepAlive::new()
                .interval(std::time::Duration::from_secs(30))
                .text("ping"),
        )
        .into_response()
}

/// Deliver one request into an open session.
async fn handle_message(
    State(state): State<Arc<SseServerState>>,
    Query(query): Query<MessageQuery>,
    headers: HeaderMap,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if let Err(rejection) = authorize(&state, &headers) {
        return rejection;
    }

    let Some(session_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "missing sessionId query parameter").into_response();
    };

    let Some(sender) = state.sessions.sender(&session_id) else {
        let err = McpError::SessionNotFound(session_id);
        return (StatusCode::NOT_FOUND, err.to_string()).into_response();
    };

    let response = state.server.handle_request(request).await;

    let data = match serde_json::to_string(&response) {
        Ok(data) => data,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("serialization error: {e}"),
            )
                .into_response();
        }
    };

    let event = SseEvent {
        event: "message".to_string(),
        data,
    };

    if sender.send(event).await.is_err() {
        // Receiver gone: the stream closed between lookup and send.
        state.sessions.remove(&session_id);
        let err = McpError::SessionNotFound(session_id);
        return (StatusCode::NOT_FOUND, err.to_string()).into_response();
    }

    (StatusCode::ACCEPTED, "Accepted").into_response()
}

struct SessionGuard {
    state: Arc<SseServerState>,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.state.sessions.remove(&self.session_id);
        tracing::info!(session = %self.session_id, "SSE session disconnected");
    }
}

/// The SSE server: binds a listener and serves the transport router.
pub struct SseServer {
    host: String,
    port: u16,
    state: Arc<SseServerState>,
}

impl SseServer {
    /// Create a new SSE server.
    pub fn new(host: impl Into<String>, port: u16, state: Arc<SseServerState>) -> Self {
        Self {
            host: host.into(),
            port,
            state,
        }
    }

    /// Run the server until the process is stopped.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("failed to bind to {addr}: {e}")))?;

        tracing::info!(addr = %addr, "MCP SSE server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::StartupFailed(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ToolExecutor;
    use crate::tools::ToolRegistry;
    use axum::body::Body;
    use axum::http::Request;
    use miga_adapter_pg::ConnectionProvider;
    use miga_core::Transport;
    use tower::ServiceExt;

    const TEST_KEY: &str = "test-secret";

    fn test_state() -> Arc<SseServerState> {
        let registry = ToolRegistry::builtin(Transport::Sse);
        let provider = ConnectionProvider::per_request("MIGA_TEST_DB_URL_UNSET");
        let server = McpServer::new(ToolExecutor::new(registry, provider));
        Arc::new(SseServerState::new(server, TEST_KEY))
    }

    fn message_request(key: Option<&str>, session_id: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(format!("/message?sessionId={session_id}"))
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
            .body(Body::from(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn liveness_endpoint_is_open() {
        let app = create_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sse_endpoint_rejects_missing_key() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        // Rejected before any session was registered.
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn message_endpoint_rejects_mismatched_key() {
        let app = create_router(test_state());
        let response = app
            .oneshot(message_request(Some("wrong-key"), "any"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn message_to_unissued_session_is_not_found() {
        let app = create_router(test_state());
        let response = app
            .oneshot(message_request(Some(TEST_KEY), "never-issued"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn message_to_registered_session_is_accepted_and_routed() {
        let state = test_state();
        let (tx, mut rx) = mpsc::channel(8);
        state.sessions.insert("s-1", tx);

        let app = create_router(state.clone());
        let response = app
            .oneshot(message_request(Some(TEST_KEY), "s-1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "message");
        assert!(event.data.contains("query_db"));
    }

    #[tokio::test]
    async fn message_to_disconnected_session_is_not_found() {
        let state = test_state();
        let (tx, rx) = mpsc::channel(8);
        state.sessions.insert("s-2", tx);
        drop(rx);

        let app = create_router(state.clone());
        let response = app
            .oneshot(message_request(Some(TEST_KEY), "s-2"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.sessions().is_empty());
    }

    #[tokio::test]
    async fn registry_tracks_connect_and_disconnect() {
        let state = test_state();
        let (tx, _rx) = mpsc::channel(1);

        state.sessions.insert("s-3", tx);
        assert_eq!(state.sessions().len(), 1);

        assert!(state.sessions.remove("s-3"));
        assert!(!state.sessions.remove("s-3"));
        assert!(state.sessions().is_empty());
    }
}
