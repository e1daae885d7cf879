//! In-memory home of the single current fixture document.
//!
//! The store is an explicit, injectable object rather than process-global
//! state: handlers share it through `Arc`, and the `parking_lot` write lock
//! serializes snapshot/update mutations. One document at a time — a new
//! snapshot discards the previous fixture wholesale.

use parking_lot::RwLock;
use std::fmt;

use super::reshaper;
use crate::models::{FixtureDocument, SnapshotPayload, UpdatePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// An update arrived before any snapshot; there is nothing to mutate.
    NoSnapshot,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NoSnapshot => write!(f, "no fixture snapshot received yet"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Holds the latest built fixture document, if any.
#[derive(Default)]
pub struct FixtureStore {
    current: RwLock<Option<FixtureDocument>>,
}

impl FixtureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a full snapshot and make it current,
    /// discarding whatever was there. Returns the document for broadcast.
    pub fn replace(&self, payload: &SnapshotPayload) -> FixtureDocument {
        let doc = reshaper::build_snapshot(payload);
        *self.current.write() = Some(doc.clone());
        doc
    }

    /// Merge a partial update into the current document. Fails when no
    /// snapshot exists yet. Returns the merged document for broadcast.
    pub fn apply_update(&self, update: &UpdatePayload) -> Result<FixtureDocument, StoreError> {
        let mut guard = self.current.write();
        let doc = guard.as_mut().ok_or(StoreError::NoSnapshot)?;
        reshaper::apply_update(doc, update);
        Ok(doc.clone())
    }

    /// Drop the current document. Returns whether one existed.
    pub fn clear(&self) -> bool {
        self.current.write().take().is_some()
    }

    pub fn has_snapshot(&self) -> bool {
        self.current.read().is_some()
    }

    /// Clone of the current document, if any.
    pub fn snapshot(&self) -> Option<FixtureDocument> {
        self.current.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_payload() -> SnapshotPayload {
        SnapshotPayload::from_value(&json!({
            "fixture_id": 1,
            "player_lines": [{"player_id": 7, "market_type": "points", "balance_line": 20}],
        }))
    }

    #[test]
    fn update_without_snapshot_is_rejected() {
        let store = FixtureStore::new();
        let update = UpdatePayload::from_value(&json!({"player_id": 7, "lines": []}));
        assert_eq!(store.apply_update(&update), Err(StoreError::NoSnapshot));
    }

    #[test]
    fn snapshot_replaces_previous_document() {
        let store = FixtureStore::new();
        store.replace(&snapshot_payload());

        let second = SnapshotPayload::from_value(&json!({
            "fixture_id": 2,
            "player_lines": [{"player_id": 8, "market_type": "assists", "balance_line": 4}],
        }));
        let doc = store.replace(&second);

        assert_eq!(doc.fixture_id, Some(json!(2)));
        assert!(!doc.players.contains_key("7"));
        assert!(store.snapshot().unwrap().players.contains_key("8"));
    }

    #[test]
    fn update_mutates_the_stored_document() {
        let store = FixtureStore::new();
        store.replace(&snapshot_payload());

        let update = UpdatePayload::from_value(&json!({
            "player_id": 7,
            "lines": [{"market_type": "points", "balance_line": 22}],
        }));
        let doc = store.apply_update(&update).unwrap();

        assert!(doc.is_update());
        // The merged state persists for the next update.
        let stored = store.snapshot().unwrap();
        assert_eq!(stored.players["7"].markets["points"].len(), 1);
    }

    #[test]
    fn clear_drops_the_document() {
        let store = FixtureStore::new();
        assert!(!store.clear());
        store.replace(&snapshot_payload());
        assert!(store.clear());
        assert!(!store.has_snapshot());
    }
}
