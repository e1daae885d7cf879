//! Single-consumer message queue.
//!
//! Rapid broadcasts must never interleave their state transitions, so
//! every incoming message goes through one channel drained by one task.
//! Each message is fully applied before the next is dequeued, with a small
//! yield between items so a burst cannot starve rendering.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::state::BoardState;

/// Pause between queued messages.
const DRAIN_YIELD: Duration = Duration::from_millis(10);

pub fn spawn_reducer(
    mut rx: mpsc::UnboundedReceiver<Value>,
    state: Arc<Mutex<BoardState>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Some(new_lines) = msg.get("new_lines").and_then(Value::as_u64) {
                debug!(new_lines, "received fixture message");
            }
            state.lock().apply(&msg);
            tokio::time::sleep(DRAIN_YIELD).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn messages_apply_in_arrival_order() {
        let state = Arc::new(Mutex::new(BoardState::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_reducer(rx, state.clone());

        for fixture_id in 1..=3 {
            tx.send(json!({
                "fixture_id": fixture_id,
                "players": {"1": {"player_id": 1, "markets": {}}},
            }))
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let state = state.lock();
        assert_eq!(state.fixture_id(), Some(&json!(3)));
    }
}
