//! Server-Sent Events endpoint.
//!
//! Each connection registers an SSE channel, receives a `connection` event
//! as its first frame, then whatever the broadcaster pushes, interleaved
//! with heartbeat comment frames. The response body is the raw channel
//! drained as a byte stream; dropping it (client went away) unregisters
//! the client and ends the heartbeat.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::stream;
use serde_json::json;
use std::convert::Infallible;
use tracing::info;

use super::routes::AppState;
use crate::broadcast::{sse_data_frame, ConnectionGuard, Transport, SSE_HEARTBEAT_FRAME};

pub async fn sse_events(State(state): State<AppState>) -> impl IntoResponse {
    let (handle, rx) = state.registry.register(Transport::Sse);
    info!(
        id = %handle.id,
        total = state.registry.count(),
        "SSE client connected"
    );

    // Initial connection event, queued before anything can be broadcast.
    let welcome = json!({
        "type": "connection",
        "message": "SSE connected",
        "timestamp": Utc::now().to_rfc3339(),
    });
    let _ = handle.send(sse_data_frame(&welcome.to_string()));

    // Periodic liveness probe. Ends as soon as the entry is gone.
    let heartbeat = handle.clone();
    let interval = state.sse_heartbeat;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // immediate first tick
        loop {
            ticker.tick().await;
            if !heartbeat.is_connected()
                || heartbeat.send(SSE_HEARTBEAT_FRAME.to_string()).is_err()
            {
                break;
            }
        }
    });

    let guard = ConnectionGuard::new(state.registry.clone(), handle.id);
    let body = Body::from_stream(stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let frame = rx.recv().await?;
        Some((Ok::<_, Infallible>(Bytes::from(frame)), (rx, guard)))
    }));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
}
