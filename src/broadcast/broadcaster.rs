//! Best-effort fan-out of one JSON message to every registered client.
//!
//! The message is serialized once; each transport gets its own framing
//! (plain text for WebSocket, `data: <json>\n\n` for SSE). A client whose
//! channel rejects the write is pruned from the registry and the loop
//! moves on — at-most-once delivery, no retry, no queuing, no replay for
//! late joiners.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, Transport};
use crate::models::FixtureDocument;

/// SSE comment frame used as a liveness probe.
pub const SSE_HEARTBEAT_FRAME: &str = ":\n\n";

/// Wrap a JSON payload as a single SSE data frame.
pub fn sse_data_frame(json: &str) -> String {
    format!("data: {json}\n\n")
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Push a fixture document to every connected client.
    pub fn broadcast_document(&self, doc: &FixtureDocument) -> usize {
        match serde_json::to_string(doc) {
            Ok(json) => self.push_all(&json, None),
            Err(e) => {
                warn!("failed to serialize fixture document: {e}");
                0
            }
        }
    }

    /// Push an arbitrary JSON message to every connected client.
    pub fn broadcast_json(&self, message: &Value) -> usize {
        match serde_json::to_string(message) {
            Ok(json) => self.push_all(&json, None),
            Err(e) => {
                warn!("failed to serialize broadcast message: {e}");
                0
            }
        }
    }

    /// Push a JSON message to WebSocket clients only (the inbound-frame
    /// echo path).
    pub fn broadcast_websocket(&self, message: &Value) -> usize {
        match serde_json::to_string(message) {
            Ok(json) => self.push_all(&json, Some(Transport::WebSocket)),
            Err(e) => {
                warn!("failed to serialize websocket echo: {e}");
                0
            }
        }
    }

    fn push_all(&self, json: &str, only: Option<Transport>) -> usize {
        let mut delivered = 0;
        for client in self.registry.clients() {
            if let Some(transport) = only {
                if client.transport != transport {
                    continue;
                }
            }
            let frame = match client.transport {
                Transport::WebSocket => json.to_string(),
                Transport::Sse => sse_data_frame(json),
            };
            if client.send(frame).is_ok() {
                delivered += 1;
            } else {
                debug!(id = %client.id, "pruning dead client during broadcast");
                self.registry.unregister(&client.id);
            }
        }
        delivered
    }
}
