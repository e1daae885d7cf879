//! Reshapes flat line-record feeds into the nested fixture document.
//!
//! A snapshot builds a whole document from scratch; an update swaps out one
//! `(player, market_type)` balance-line map in an existing document. Both
//! paths tolerate arbitrary missing fields — a line that cannot be filed
//! (no player id, no market type, no balance line) simply contributes no
//! cell, while still counting toward the diagnostic `new_lines`.

use crate::models::{FixtureDocument, PlayerEntry, SnapshotPayload, UpdatePayload};

/// Build a fresh fixture document from a full-snapshot payload.
///
/// Players are keyed by the canonical form of `player_id`, so numeric `7`
/// and string `"7"` land in the same entry. Descriptive player fields come
/// from the first line seen for the player; later lines only add market
/// cells. Duplicate `(player, market, line)` triples resolve last-one-wins.
pub fn build_snapshot(payload: &SnapshotPayload) -> FixtureDocument {
    let mut doc = FixtureDocument {
        fixture_id: payload.fixture_id.clone(),
        is_new: payload.is_new.clone(),
        message_id: payload.message_id.clone(),
        new_lines: payload.player_lines.len(),
        specials: payload.specials.clone(),
        is_specials: payload.is_specials.clone(),
        ..Default::default()
    };

    for line in &payload.player_lines {
        let Some(player_key) = line.player_key() else {
            continue;
        };

        let entry = doc
            .players
            .entry(player_key)
            .or_insert_with(|| PlayerEntry::from_line(line));

        let (Some(market_type), Some(balance_key)) = (line.market_type(), line.balance_key())
        else {
            continue;
        };

        entry
            .markets
            .entry(market_type.to_string())
            .or_default()
            .insert(balance_key, line.clone());
    }

    doc
}

/// Apply a partial update to an existing document, in place.
///
/// The update replaces the whole balance-line map for the named player and
/// the market type taken from the *first* line of the batch — every line in
/// the batch is filed under that one market type, whatever its own
/// `market_type` says. While repopulating, a line marked balanced forces
/// `is_balanced: false` onto every cell already written, so a later
/// balanced line in the batch wins.
///
/// An unknown player or an empty batch leaves `players` untouched; the
/// envelope metadata (`isUpdate`, `updateMessageId`, `new_lines`) is
/// stamped either way and the document is still broadcast.
pub fn apply_update(doc: &mut FixtureDocument, update: &UpdatePayload) {
    doc.is_update = Some(true);
    doc.update_message_id = update.message_id.clone();
    doc.new_lines = update.lines.len();
    if update.specials.is_some() {
        doc.specials = update.specials.clone();
    }
    if update.is_specials.is_some() {
        doc.is_specials = update.is_specials.clone();
    }

    let Some(player_key) = update.player_key() else {
        return;
    };
    let Some(entry) = doc.players.get_mut(&player_key) else {
        return;
    };
    let Some(market_type) = update.lines.first().and_then(|l| l.market_type()) else {
        return;
    };
    let market_type = market_type.to_string();

    let mut fresh = crate::models::BalanceLineMap::new();
    for line in &update.lines {
        if line.balanced() {
            for cell in fresh.values_mut() {
                cell.clear_balanced();
            }
        }
        if let Some(key) = line.balance_key() {
            fresh.insert(key, line.clone());
        }
    }

    entry.markets.insert(market_type, fresh);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LineKey;
    use serde_json::{json, Value};

    fn snapshot_from(body: Value) -> FixtureDocument {
        build_snapshot(&SnapshotPayload::from_value(&body))
    }

    #[test]
    fn snapshot_groups_lines_by_player_and_market() {
        let doc = snapshot_from(json!({
            "fixture_id": 42,
            "player_lines": [
                {"player_id": 7, "player_name": "A. Guard", "market_type": "points", "balance_line": 20, "balance_line_over_odds": 1.9},
                {"player_id": 7, "market_type": "points", "balance_line": 22, "balance_line_over_odds": 2.1},
                {"player_id": 7, "market_type": "assists", "balance_line": 5.5},
                {"player_id": 9, "market_type": "points", "balance_line": 12},
            ],
        }));

        assert_eq!(doc.players.len(), 2);
        assert_eq!(doc.new_lines, 4);

        let p7 = &doc.players["7"];
        assert_eq!(p7.markets["points"].len(), 2);
        assert_eq!(p7.markets["assists"].len(), 1);
        assert!(p7.markets["points"].contains_key(&LineKey::new("20")));
        assert!(p7.markets["points"].contains_key(&LineKey::new("22")));
        assert_eq!(doc.players["9"].markets["points"].len(), 1);
    }

    #[test]
    fn numeric_and_string_player_ids_match_loosely() {
        let doc = snapshot_from(json!({
            "player_lines": [
                {"player_id": 7, "market_type": "points", "balance_line": 20},
                {"player_id": "7", "market_type": "assists", "balance_line": 4},
            ],
        }));

        assert_eq!(doc.players.len(), 1);
        assert_eq!(doc.players["7"].markets.len(), 2);
    }

    #[test]
    fn duplicate_triples_resolve_last_one_wins() {
        let doc = snapshot_from(json!({
            "player_lines": [
                {"player_id": 1, "market_type": "points", "balance_line": 10, "balance_line_over_odds": 1.5},
                {"player_id": 1, "market_type": "points", "balance_line": 10, "balance_line_over_odds": 1.8},
            ],
        }));

        let cell = &doc.players["1"].markets["points"][&LineKey::new("10")];
        assert_eq!(cell.balance_line_over_odds, Some(json!(1.8)));
        assert_eq!(doc.players["1"].markets["points"].len(), 1);
    }

    #[test]
    fn descriptive_fields_fixed_at_first_insertion() {
        let doc = snapshot_from(json!({
            "player_lines": [
                {"player_id": 1, "player_name": "First Seen", "market_type": "points", "balance_line": 10},
                {"player_id": 1, "player_name": "Rewritten", "market_type": "points", "balance_line": 12},
            ],
        }));

        assert_eq!(doc.players["1"].player_name, Some(json!("First Seen")));
    }

    #[test]
    fn keyless_lines_count_but_do_not_file() {
        let doc = snapshot_from(json!({
            "player_lines": [
                {"market_type": "points", "balance_line": 10},
                {"player_id": 3, "balance_line": 10},
                {"player_id": 3, "market_type": "points"},
            ],
        }));

        assert_eq!(doc.new_lines, 3);
        // Player 3 exists (descriptive capture) but holds no cells.
        assert!(doc.players["3"].markets.is_empty());
        assert_eq!(doc.players.len(), 1);
    }

    #[test]
    fn update_replaces_the_whole_balance_line_map() {
        let mut doc = snapshot_from(json!({
            "player_lines": [
                {"player_id": 7, "market_type": "points", "balance_line": 20, "balance_line_over_odds": 1.9, "is_balanced": true},
                {"player_id": 7, "market_type": "points", "balance_line": 22, "balance_line_over_odds": 2.1, "is_balanced": false},
            ],
        }));

        apply_update(
            &mut doc,
            &UpdatePayload::from_value(&json!({
                "player_id": 7,
                "lines": [
                    {"market_type": "points", "balance_line": 22, "is_balanced": true, "balance_line_over_odds": 2.0},
                ],
            })),
        );

        let points = &doc.players["7"].markets["points"];
        assert_eq!(points.len(), 1);
        let cell = &points[&LineKey::new("22")];
        assert_eq!(cell.balance_line_over_odds, Some(json!(2.0)));
        assert!(cell.balanced());
        assert_eq!(doc.is_update, Some(true));
        assert_eq!(doc.new_lines, 1);
    }

    #[test]
    fn later_balanced_line_wins() {
        let mut doc = snapshot_from(json!({
            "player_lines": [{"player_id": 7, "market_type": "points", "balance_line": 18}],
        }));

        apply_update(
            &mut doc,
            &UpdatePayload::from_value(&json!({
                "player_id": 7,
                "lines": [
                    {"market_type": "points", "balance_line": 20, "is_balanced": true},
                    {"market_type": "points", "balance_line": 22, "is_balanced": true},
                ],
            })),
        );

        let points = &doc.players["7"].markets["points"];
        assert!(!points[&LineKey::new("20")].balanced());
        assert!(points[&LineKey::new("22")].balanced());
        let balanced: usize = points.values().filter(|c| c.balanced()).count();
        assert_eq!(balanced, 1);
    }

    #[test]
    fn update_batch_shares_first_lines_market_type() {
        let mut doc = snapshot_from(json!({
            "player_lines": [{"player_id": 7, "market_type": "points", "balance_line": 18}],
        }));

        // The second line claims a different market type; it is filed under
        // the first line's bucket anyway.
        apply_update(
            &mut doc,
            &UpdatePayload::from_value(&json!({
                "player_id": 7,
                "lines": [
                    {"market_type": "assists", "balance_line": 4},
                    {"market_type": "points", "balance_line": 20},
                ],
            })),
        );

        let p7 = &doc.players["7"];
        assert!(p7.markets.contains_key("assists"));
        assert_eq!(p7.markets["assists"].len(), 2);
        // The old points map is untouched.
        assert_eq!(p7.markets["points"].len(), 1);
    }

    #[test]
    fn update_for_unknown_player_only_stamps_envelope() {
        let mut doc = snapshot_from(json!({
            "player_lines": [{"player_id": 7, "market_type": "points", "balance_line": 18}],
        }));
        let before_players = doc.players.clone();

        apply_update(
            &mut doc,
            &UpdatePayload::from_value(&json!({
                "player_id": 99,
                "lines": [{"market_type": "points", "balance_line": 20}],
                "messageId": "u-1",
            })),
        );

        assert_eq!(doc.players, before_players);
        assert_eq!(doc.is_update, Some(true));
        assert_eq!(doc.update_message_id, Some(json!("u-1")));
        assert_eq!(doc.new_lines, 1);
    }

    #[test]
    fn empty_update_batch_is_a_stamped_no_op() {
        let mut doc = snapshot_from(json!({
            "player_lines": [{"player_id": 7, "market_type": "points", "balance_line": 18}],
        }));

        apply_update(&mut doc, &UpdatePayload::from_value(&json!({"player_id": 7})));

        assert_eq!(doc.players["7"].markets["points"].len(), 1);
        assert_eq!(doc.new_lines, 0);
        assert!(doc.is_update());
    }

    #[test]
    fn spec_example_scenario() {
        let mut doc = snapshot_from(json!({
            "player_lines": [
                {"player_id": 7, "market_type": "points", "balance_line": 20, "balance_line_over_odds": 1.9, "is_balanced": true},
                {"player_id": 7, "market_type": "points", "balance_line": 22, "balance_line_over_odds": 2.1, "is_balanced": false},
            ],
        }));

        {
            let points = &doc.players["7"].markets["points"];
            assert!(points[&LineKey::new("20")].balanced());
            assert!(!points[&LineKey::new("22")].balanced());
        }

        apply_update(
            &mut doc,
            &UpdatePayload::from_value(&json!({
                "player_id": 7,
                "lines": [{"market_type": "points", "balance_line": 22, "is_balanced": true, "balance_line_over_odds": 2.0}],
            })),
        );

        let points = &doc.players["7"].markets["points"];
        assert!(!points.contains_key(&LineKey::new("20")));
        let cell = &points[&LineKey::new("22")];
        assert!(cell.balanced());
        assert_eq!(cell.balance_line_over_odds, Some(json!(2.0)));
    }
}
