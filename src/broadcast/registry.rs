//! Connection registry: bookkeeping for WebSocket and SSE clients.
//!
//! Both transports register the same kind of handle — an id, a transport
//! tag, a connected flag, and an unbounded sender of pre-framed outbound
//! text. The task that owns the actual socket (or SSE response stream)
//! holds the receiving end; everything upstream just calls `send`.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Which transport a registered client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    WebSocket,
    Sse,
}

/// Send failure: the peer is gone (channel closed or already marked
/// disconnected). The caller is expected to unregister the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientGone;

/// Outbound half of one client connection.
pub struct ClientHandle {
    pub id: Uuid,
    pub transport: Transport,
    tx: mpsc::UnboundedSender<String>,
    connected: AtomicBool,
}

impl ClientHandle {
    fn new(transport: Transport) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::new(Self {
            id: Uuid::new_v4(),
            transport,
            tx,
            connected: AtomicBool::new(true),
        });
        (handle, rx)
    }

    /// Queue one pre-framed text frame for this client.
    pub fn send(&self, frame: String) -> Result<(), ClientGone> {
        if !self.is_connected() {
            return Err(ClientGone);
        }
        self.tx.send(frame).map_err(|_| {
            self.close();
            ClientGone
        })
    }

    /// Mark the connection dead. Further sends become no-ops.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// Registry of all currently-open client connections, both transports.
#[derive(Default)]
pub struct ConnectionRegistry {
    clients: RwLock<HashMap<Uuid, Arc<ClientHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; returns the shared handle plus the receiver the
    /// transport task drains.
    pub fn register(&self, transport: Transport) -> (Arc<ClientHandle>, mpsc::UnboundedReceiver<String>) {
        let (handle, rx) = ClientHandle::new(transport);
        self.clients.write().insert(handle.id, handle.clone());
        debug!(id = %handle.id, transport = ?transport, total = self.count(), "client registered");
        (handle, rx)
    }

    /// Remove a connection. Safe to call any number of times.
    pub fn unregister(&self, id: &Uuid) {
        let removed = self.clients.write().remove(id);
        if let Some(handle) = removed {
            handle.close();
            debug!(id = %id, total = self.count(), "client unregistered");
        }
    }

    /// Snapshot of live handles, in registry iteration order at call time.
    pub fn clients(&self) -> Vec<Arc<ClientHandle>> {
        self.clients.read().values().cloned().collect()
    }

    /// Total connections across both transports.
    pub fn count(&self) -> usize {
        self.clients.read().len()
    }

    /// Per-transport counts: `(websocket, sse)`.
    pub fn counts(&self) -> (usize, usize) {
        let clients = self.clients.read();
        let ws = clients
            .values()
            .filter(|c| c.transport == Transport::WebSocket)
            .count();
        (ws, clients.len() - ws)
    }
}

/// Unregisters a client when dropped. Held inside a transport's stream
/// state so that a client vanishing mid-response still gets cleaned up.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: Uuid,
}

impl ConnectionGuard {
    pub fn new(registry: Arc<ConnectionRegistry>, id: Uuid) -> Self {
        Self { registry, id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_count_by_transport() {
        let registry = ConnectionRegistry::new();
        let (_ws, _ws_rx) = registry.register(Transport::WebSocket);
        let (_sse1, _sse1_rx) = registry.register(Transport::Sse);
        let (_sse2, _sse2_rx) = registry.register(Transport::Sse);

        assert_eq!(registry.count(), 3);
        assert_eq!(registry.counts(), (1, 2));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(Transport::Sse);

        registry.unregister(&handle.id);
        registry.unregister(&handle.id);

        assert_eq!(registry.count(), 0);
        assert!(!handle.is_connected());
    }

    #[test]
    fn send_after_close_is_an_error() {
        let registry = ConnectionRegistry::new();
        let (handle, mut rx) = registry.register(Transport::WebSocket);

        handle.send("one".to_string()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), "one");

        handle.close();
        assert_eq!(handle.send("two".to_string()), Err(ClientGone));
    }

    #[test]
    fn send_to_dropped_receiver_fails_and_marks_disconnected() {
        let registry = ConnectionRegistry::new();
        let (handle, rx) = registry.register(Transport::Sse);
        drop(rx);

        assert_eq!(handle.send("gone".to_string()), Err(ClientGone));
        assert!(!handle.is_connected());
    }

    #[test]
    fn guard_unregisters_on_drop() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, _rx) = registry.register(Transport::Sse);
        let guard = ConnectionGuard::new(registry.clone(), handle.id);

        assert_eq!(registry.count(), 1);
        drop(guard);
        assert_eq!(registry.count(), 0);
    }
}
