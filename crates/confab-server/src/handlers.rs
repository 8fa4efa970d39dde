//! HTTP and WebSocket handlers for the Confab server.
//!
//! Routes:
//!
//! - `GET /ws/chat/{peer_id}?token=<jwt>` - the live chat connection
//! - `GET /api/chat/history/{peer_id}` - the room's persisted messages
//! - `GET /health` - liveness probe

use crate::auth::{self, TokenVerifier};
use crate::config::Config;
use crate::metrics;
use crate::session;
use anyhow::Result;
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use confab_core::{room_id, BusConfig, LocalBus, UserId};
use confab_store::{Store, StoreError, StoredMessage};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The broadcast bus.
    pub bus: LocalBus,
    /// The durable store.
    pub store: Store,
    /// Access-token verifier.
    pub verifier: TokenVerifier,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config, store: Store) -> Self {
        let bus = LocalBus::with_config(BusConfig {
            max_rooms: config.limits.max_rooms,
            room_capacity: config.limits.room_capacity,
        });
        let verifier = TokenVerifier::new(&config.auth.secret, config.auth.leeway_secs);

        Self {
            bus,
            store,
            verifier,
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let store = Store::connect(&config.database.url, config.database.max_connections).await?;
    let state = Arc::new(AppState::new(config.clone(), store));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route("/ws/chat/:peer_id", get(ws_handler))
        .route("/api/chat/history/:peer_id", get(history_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Confab server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws/chat/{{peer_id}}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct WsParams {
    token: Option<String>,
}

/// WebSocket upgrade handler for `/ws/chat/{peer_id}`.
async fn ws_handler(
    Path(peer_id): Path<UserId>,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::run(socket, state, peer_id, params.token))
}

/// Failures of the history endpoint.
#[derive(Debug)]
enum HistoryError {
    /// Missing or invalid bearer token.
    Unauthorized,
    /// Requester and peer are not friends.
    Forbidden,
    /// Store failure.
    Internal,
}

impl From<StoreError> for HistoryError {
    fn from(e: StoreError) -> Self {
        warn!(error = %e, "History query failed");
        Self::Internal
    }
}

impl IntoResponse for HistoryError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "You can only chat with friends"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

/// Chat history between the authenticated user and a friend, ascending.
async fn history_handler(
    Path(peer_id): Path<UserId>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<StoredMessage>>, HistoryError> {
    let token = auth::bearer_token(&headers).ok_or(HistoryError::Unauthorized)?;
    let user = state
        .verifier
        .verify(token, &state.store)
        .await
        .map_err(|_| HistoryError::Unauthorized)?;

    if !state.store.is_connected(user.id, peer_id).await? {
        return Err(HistoryError::Forbidden);
    }

    let room = room_id(user.id, peer_id);
    let messages = state.store.history(&room).await?;
    Ok(Json(messages))
}
