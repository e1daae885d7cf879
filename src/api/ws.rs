//! WebSocket endpoint.
//!
//! On connect the server sends a welcome frame. Inbound text frames are
//! parsed as JSON and echoed to every WebSocket client wrapped in a
//! `broadcast` envelope; a frame that fails to parse is logged and
//! dropped, and the connection stays open.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use super::routes::AppState;
use crate::broadcast::Transport;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (handle, mut rx) = state.registry.register(Transport::WebSocket);
    let client_id = handle.id;

    info!(id = %client_id, total = state.registry.count(), "WebSocket client connected");

    // Welcome frame goes straight to the socket, ahead of any broadcast.
    let welcome = json!({
        "type": "connection",
        "message": "WebSocket connection established",
        "timestamp": Utc::now().to_rfc3339(),
    });
    if ws_tx.send(Message::Text(welcome.to_string())).await.is_err() {
        state.registry.unregister(&client_id);
        return;
    }

    // Forward broadcast frames from the registry channel to the socket.
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_tx.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(data) => {
                    state.broadcaster.broadcast_websocket(&json!({
                        "type": "broadcast",
                        "data": data,
                        "timestamp": Utc::now().to_rfc3339(),
                    }));
                }
                Err(e) => {
                    // Malformed frame: log and drop, keep the connection.
                    warn!(id = %client_id, error = %e, "Error parsing WebSocket message");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(&client_id);
    send_task.abort();
    info!(id = %client_id, total = state.registry.count(), "WebSocket client disconnected");
}
