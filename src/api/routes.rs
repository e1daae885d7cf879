use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::broadcast::{Broadcaster, ConnectionRegistry};
use crate::config::Config;
use crate::fixtures::{FixtureStore, StoreError};
use crate::models::{SnapshotPayload, UpdatePayload};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FixtureStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub sse_heartbeat: Duration,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        Self {
            store: Arc::new(FixtureStore::new()),
            broadcaster: Broadcaster::new(registry.clone()),
            registry,
            sse_heartbeat: config.sse_heartbeat,
            started_at: Instant::now(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/hello", get(hello))
        .route("/api/events", get(super::events::sse_events))
        .route("/api/data", post(ingest_data))
        .route("/api/status", get(get_status))
        .route("/api/push", post(push_message))
        .route("/api/clear", post(clear_data))
        .route("/ws", get(super::ws::websocket_handler))
        .layer(axum::middleware::from_fn(crate::middleware::request_logging))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> &'static str {
    "🎯 Odds Composer Operational"
}

async fn hello() -> Json<Value> {
    Json(json!({ "message": "Hello from the backend!" }))
}

/// Ingest a fixture payload: a full snapshot (no top-level `player_id`)
/// replaces the current document; a partial update (has `player_id`)
/// rewrites one player/market sub-map. Either way the resulting document
/// is broadcast to every connected client.
async fn ingest_data(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let doc = if body.get("player_id").is_some() {
        let update = UpdatePayload::from_value(&body);
        match state.store.apply_update(&update) {
            Ok(doc) => doc,
            Err(StoreError::NoSnapshot) => {
                return Err(ApiError::BadRequest(
                    "Update received but no fixture snapshot exists yet".to_string(),
                ))
            }
        }
    } else {
        let snapshot = SnapshotPayload::from_value(&body);
        state.store.replace(&snapshot)
    };

    let delivered = state.broadcaster.broadcast_document(&doc);
    info!(
        new_lines = doc.new_lines,
        players = doc.players.len(),
        is_update = doc.is_update(),
        delivered,
        "📡 Fixture document broadcast"
    );

    Ok(Json(json!({
        "message": "Data received successfully!",
        "receivedData": body,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Connection counts and uptime, for diagnostics.
async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let (ws, sse) = state.registry.counts();
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "websocketConnections": ws,
        "sseConnections": sse,
    }))
}

/// Out-of-band broadcast of an arbitrary notification message.
async fn push_message(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let Some(message) = body.get("message").filter(|m| !m.is_null()) else {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    };
    let kind = body
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("notification");

    state.broadcaster.broadcast_json(&json!({
        "type": kind,
        "message": message,
        "timestamp": Utc::now().to_rfc3339(),
    }));

    Ok(Json(json!({
        "success": true,
        "message": "Data pushed to all connected clients",
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Drop the current fixture document and tell clients to reset.
async fn clear_data(State(state): State<AppState>) -> Json<Value> {
    let cleared = state.store.clear();
    state.broadcaster.broadcast_json(&json!({
        "type": "clear",
        "message": "Fixture data cleared",
        "timestamp": Utc::now().to_rfc3339(),
    }));

    Json(json!({
        "message": "Data cleared",
        "cleared": cleared,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ===== Error Handling =====

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let err = anyhow::anyhow!("Test error");
        let api_err: ApiError = err.into();

        match api_err {
            ApiError::Internal(_) => (),
            _ => panic!("Expected Internal error"),
        }
    }
}
