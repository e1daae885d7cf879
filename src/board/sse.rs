//! SSE consumer for the board.
//!
//! Connects to the backend's `/api/events` stream, splits the byte stream
//! into SSE frames, and feeds each `data:` payload into the reducer queue.
//! Any error or end-of-stream flips the connected flag and retries after a
//! fixed delay, forever. Comment frames (heartbeats) are ignored.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::state::BoardState;

const RECONNECT_DELAY: Duration = Duration::from_secs(3);
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct SseClient {
    base_url: String,
    http: reqwest::Client,
    tx: mpsc::UnboundedSender<Value>,
    state: Arc<Mutex<BoardState>>,
}

impl SseClient {
    pub fn new(
        base_url: String,
        tx: mpsc::UnboundedSender<Value>,
        state: Arc<Mutex<BoardState>>,
    ) -> Self {
        Self {
            base_url,
            http: reqwest::Client::new(),
            tx,
            state,
        }
    }

    /// Connect-consume-reconnect loop. Never returns.
    pub async fn run(self) {
        loop {
            match self.consume_stream().await {
                Ok(()) => debug!("SSE stream ended, reconnecting"),
                Err(e) => warn!("SSE connection error: {e:#}"),
            }
            self.state.lock().sse_connected = false;
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn consume_stream(&self) -> Result<()> {
        let url = format!("{}/api/events", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("SSE request failed")?
            .error_for_status()
            .context("SSE endpoint returned error status")?;

        self.state.lock().sse_connected = true;

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("SSE stream read failed")?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Frames are separated by a blank line.
            while let Some(pos) = buffer.find("\n\n") {
                let frame = buffer[..pos].to_string();
                buffer.drain(..pos + 2);
                if let Some(payload) = parse_frame(&frame) {
                    let _ = self.tx.send(payload);
                }
            }
        }

        Ok(())
    }
}

/// Extract the JSON payload from one SSE frame, if it carries one.
fn parse_frame(frame: &str) -> Option<Value> {
    let data: String = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect::<Vec<_>>()
        .join("\n");
    if data.is_empty() {
        return None;
    }
    serde_json::from_str(&data).ok()
}

/// Refresh the connection counter shown in the board header.
pub async fn poll_status(base_url: String, state: Arc<Mutex<BoardState>>) {
    let http = reqwest::Client::new();
    let url = format!("{}/api/status", base_url);
    let mut ticker = tokio::time::interval(STATUS_POLL_INTERVAL);
    loop {
        ticker.tick().await;
        let Ok(response) = http.get(&url).send().await else {
            continue;
        };
        let Ok(status) = response.json::<Value>().await else {
            continue;
        };
        let ws = status
            .get("websocketConnections")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let sse = status
            .get("sseConnections")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        state.lock().connection_count = (ws + sse) as usize;
    }
}

/// Fire-and-forget request asking the backend to flush fixture data.
pub fn request_clear(base_url: &str) {
    let url = format!("{}/api/clear", base_url);
    tokio::spawn(async move {
        let http = reqwest::Client::new();
        if let Err(e) = http.post(&url).send().await {
            warn!("clear request failed: {e}");
        }
    });
}
