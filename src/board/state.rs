//! The board's view of the world, rebuilt from the message stream.

use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{canonical_key, FixtureDocument, LineKey, LineRecord, PlayerEntry};

/// Market columns rendered on the balanced-lines table, in display order.
pub const MARKET_TYPES: &[&str] = &[
    "points",
    "total_rebounds",
    "assists",
    "blocks",
    "steals",
    "turnovers",
    "three_point_field_goal",
    "pra",
    "pr",
    "pa",
    "bs",
    "ra",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    Up,
    Down,
}

/// Specials selections shipped alongside fixture payloads, kept raw.
#[derive(Debug, Clone, Default)]
pub struct SpecialsData {
    pub fixture_id: Option<Value>,
    pub specials: Vec<Value>,
}

/// Everything the board renders, plus the per-cell selection cache.
#[derive(Default)]
pub struct BoardState {
    /// Latest message carrying a `players` object, snapshot or merged update.
    pub latest: Option<FixtureDocument>,
    pub specials: Option<SpecialsData>,
    /// Manual balance-line choice per `(player_key, market_type)` cell.
    /// Cleared whenever the server signals a structural change.
    selections: HashMap<(String, String), LineKey>,
    pub open_accordions: HashSet<String>,
    pub sse_connected: bool,
    pub connection_count: usize,
    /// `new_lines` from the most recent fixture message. Diagnostic only.
    pub last_new_lines: Option<usize>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one broadcast message. Messages must be fed in arrival order;
    /// the reducer task guarantees that.
    pub fn apply(&mut self, msg: &Value) {
        if msg.get("type").and_then(Value::as_str) == Some("clear") {
            self.latest = None;
            self.specials = None;
            self.selections.clear();
            self.open_accordions.clear();
            return;
        }

        // A message may carry specials alongside players; not either-or.
        if let Some(specials) = extract_specials(msg) {
            self.specials = Some(specials);
        }

        if !msg.get("players").map(Value::is_object).unwrap_or(false) {
            return;
        }
        let Ok(doc) = serde_json::from_value::<FixtureDocument>(msg.clone()) else {
            return;
        };

        self.last_new_lines = Some(doc.new_lines);

        if doc.is_update() {
            // The backend already merged; take it as authoritative. The
            // selection cache goes stale with it.
            self.selections.clear();
            self.latest = Some(doc);
        } else {
            // Full snapshot: replace the view and drop transient UI state.
            self.selections.clear();
            self.open_accordions.clear();
            if msg.get("specials").is_none() {
                self.specials = None;
            }
            self.latest = Some(doc);
        }
    }

    /// Players sorted by team name for display.
    pub fn players_sorted(&self) -> Vec<(&String, &PlayerEntry)> {
        let Some(doc) = &self.latest else {
            return Vec::new();
        };
        let mut players: Vec<_> = doc.players.iter().collect();
        players.sort_by(|a, b| a.1.team_name().cmp(b.1.team_name()));
        players
    }

    pub fn fixture_id(&self) -> Option<&Value> {
        self.latest.as_ref().and_then(|d| d.fixture_id.as_ref())
    }

    fn market(&self, player_key: &str, market_type: &str) -> Option<&crate::models::BalanceLineMap> {
        self.latest
            .as_ref()?
            .players
            .get(player_key)?
            .markets
            .get(market_type)
    }

    /// Numeric balance lines available for a cell, ascending.
    pub fn available_lines(&self, player_key: &str, market_type: &str) -> Vec<LineKey> {
        let Some(market) = self.market(player_key, market_type) else {
            return Vec::new();
        };
        market
            .keys()
            .filter(|k| k.value().is_some())
            .cloned()
            .collect()
    }

    /// The line a cell shows by default: the balanced one, else the smallest.
    fn default_line(&self, player_key: &str, market_type: &str) -> Option<LineKey> {
        let market = self.market(player_key, market_type)?;
        let lines = self.available_lines(player_key, market_type);
        lines
            .iter()
            .find(|k| market.get(k).map(LineRecord::balanced).unwrap_or(false))
            .or_else(|| lines.first())
            .cloned()
    }

    /// The line a cell currently shows: manual selection, else default.
    pub fn current_line(&self, player_key: &str, market_type: &str) -> Option<LineKey> {
        let cache_key = (player_key.to_string(), market_type.to_string());
        if let Some(selected) = self.selections.get(&cache_key) {
            return Some(selected.clone());
        }
        self.default_line(player_key, market_type)
    }

    /// The cell record behind the currently shown line.
    pub fn current_cell(&self, player_key: &str, market_type: &str) -> Option<&LineRecord> {
        let line = self.current_line(player_key, market_type)?;
        self.market(player_key, market_type)?.get(&line)
    }

    /// Step the shown balance line up or down, wrapping at either end. A
    /// remembered line that no longer exists steps to the nearest line in
    /// the requested direction, falling back to the wrap target.
    pub fn cycle_line(&mut self, player_key: &str, market_type: &str, direction: CycleDirection) {
        let lines = self.available_lines(player_key, market_type);
        if lines.is_empty() {
            return;
        }
        let Some(current) = self.current_line(player_key, market_type) else {
            return;
        };

        let next = match lines.iter().position(|k| *k == current) {
            Some(idx) => match direction {
                CycleDirection::Up => {
                    if idx + 1 == lines.len() {
                        lines[0].clone()
                    } else {
                        lines[idx + 1].clone()
                    }
                }
                CycleDirection::Down => {
                    if idx == 0 {
                        lines[lines.len() - 1].clone()
                    } else {
                        lines[idx - 1].clone()
                    }
                }
            },
            None => match direction {
                CycleDirection::Up => lines
                    .iter()
                    .find(|k| **k > current)
                    .unwrap_or(&lines[0])
                    .clone(),
                CycleDirection::Down => lines
                    .iter()
                    .rev()
                    .find(|k| **k < current)
                    .unwrap_or(&lines[lines.len() - 1])
                    .clone(),
            },
        };

        self.selections
            .insert((player_key.to_string(), market_type.to_string()), next);
    }

    /// Distinct milestone lines across all players for one market,
    /// ascending. A cell without `milestone_line` falls back to its
    /// balance-line key.
    pub fn milestone_lines(&self, market_type: &str) -> Vec<LineKey> {
        let Some(doc) = &self.latest else {
            return Vec::new();
        };
        let mut lines = BTreeSet::new();
        for player in doc.players.values() {
            let Some(market) = player.markets.get(market_type) else {
                continue;
            };
            for (key, record) in market {
                if key.value().is_none() {
                    continue;
                }
                let milestone = record
                    .milestone_line
                    .as_ref()
                    .and_then(LineKey::from_json)
                    .unwrap_or_else(|| key.clone());
                lines.insert(milestone);
            }
        }
        lines.into_iter().collect()
    }

    /// The record whose milestone line (or `line_key` field) matches.
    pub fn milestone_cell<'a>(
        &self,
        player: &'a PlayerEntry,
        market_type: &str,
        milestone: &LineKey,
    ) -> Option<&'a LineRecord> {
        let market = player.markets.get(market_type)?;
        market.values().find(|record| {
            let line = record
                .milestone_line
                .as_ref()
                .and_then(LineKey::from_json)
                .or_else(|| record.line_key.as_ref().and_then(LineKey::from_json));
            line.as_ref() == Some(milestone)
        })
    }

    /// Specials grouped by market type, selections sorted by name.
    pub fn specials_by_market(&self) -> Vec<(String, Vec<&Value>)> {
        let Some(specials) = &self.specials else {
            return Vec::new();
        };
        let mut grouped: HashMap<String, Vec<&Value>> = HashMap::new();
        for special in &specials.specials {
            let market = special
                .get("market_type")
                .and_then(canonical_key)
                .unwrap_or_else(|| "unknown".to_string());
            grouped.entry(market).or_default().push(special);
        }
        let mut out: Vec<_> = grouped.into_iter().collect();
        for (_, selections) in out.iter_mut() {
            selections.sort_by_key(|s| {
                s.get("selection_name")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string()
            });
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn toggle_accordion(&mut self, market_type: &str) {
        if !self.open_accordions.remove(market_type) {
            self.open_accordions.insert(market_type.to_string());
        }
    }
}

fn extract_specials(msg: &Value) -> Option<SpecialsData> {
    let specials = msg.get("specials")?.as_array()?;
    Some(SpecialsData {
        fixture_id: msg.get("fixture_id").cloned(),
        specials: specials.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_msg() -> Value {
        json!({
            "fixture_id": 42,
            "new_lines": 3,
            "players": {
                "7": {
                    "player_id": 7,
                    "player_name": "A. Guard",
                    "player_team_name": "Blues",
                    "markets": {
                        "points": {
                            "18": {"balance_line": 18, "balance_line_over_odds": 1.7},
                            "20": {"balance_line": 20, "balance_line_over_odds": 1.9, "is_balanced": true},
                            "22": {"balance_line": 22, "balance_line_over_odds": 2.1},
                        }
                    }
                },
                "9": {
                    "player_id": 9,
                    "player_name": "B. Center",
                    "player_team_name": "Aces",
                    "markets": {}
                }
            }
        })
    }

    #[test]
    fn snapshot_replaces_view_and_seeds_defaults() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());

        assert_eq!(state.fixture_id(), Some(&json!(42)));
        assert_eq!(state.last_new_lines, Some(3));
        // Default shows the balanced line.
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "20");
        // Players sort by team name: Aces before Blues.
        let order: Vec<&str> = state.players_sorted().iter().map(|(_, p)| p.name()).collect();
        assert_eq!(order, ["B. Center", "A. Guard"]);
    }

    #[test]
    fn default_falls_back_to_smallest_line() {
        let mut state = BoardState::new();
        let mut msg = snapshot_msg();
        msg["players"]["7"]["markets"]["points"]["20"]["is_balanced"] = json!(false);
        state.apply(&msg);

        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "18");
    }

    #[test]
    fn cycling_wraps_at_both_ends() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());

        // 20 -> 22 -> wrap to 18.
        state.cycle_line("7", "points", CycleDirection::Up);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "22");
        state.cycle_line("7", "points", CycleDirection::Up);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "18");
        // 18 -> wrap down to 22.
        state.cycle_line("7", "points", CycleDirection::Down);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "22");
    }

    #[test]
    fn update_clears_selection_cache() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());
        state.cycle_line("7", "points", CycleDirection::Up);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "22");

        let update = json!({
            "fixture_id": 42,
            "isUpdate": true,
            "new_lines": 1,
            "players": {
                "7": {
                    "player_id": 7,
                    "markets": {
                        "points": {
                            "21": {"balance_line": 21, "is_balanced": true},
                        }
                    }
                }
            }
        });
        state.apply(&update);

        // Manual choice is gone; the new balanced line shows.
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "21");
        assert_eq!(state.last_new_lines, Some(1));
    }

    #[test]
    fn stale_selection_steps_to_nearest_line() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());
        // Remember a line, then make it disappear without an update flag
        // reset (simulates cache pointing at a gone line).
        state.selections.insert(
            ("7".to_string(), "points".to_string()),
            LineKey::new("19"),
        );

        state.cycle_line("7", "points", CycleDirection::Up);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "20");

        state.selections.insert(
            ("7".to_string(), "points".to_string()),
            LineKey::new("19"),
        );
        state.cycle_line("7", "points", CycleDirection::Down);
        assert_eq!(state.current_line("7", "points").unwrap().as_str(), "18");
    }

    #[test]
    fn messages_without_players_leave_the_view_alone() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());
        state.apply(&json!({"type": "notification", "message": "hi"}));
        assert!(state.latest.is_some());
    }

    #[test]
    fn clear_message_resets_everything() {
        let mut state = BoardState::new();
        state.apply(&snapshot_msg());
        state.toggle_accordion("points");
        state.apply(&json!({"type": "clear"}));

        assert!(state.latest.is_none());
        assert!(state.specials.is_none());
        assert!(state.open_accordions.is_empty());
    }

    #[test]
    fn specials_ride_along_and_group_by_market() {
        let mut state = BoardState::new();
        let mut msg = snapshot_msg();
        msg["specials"] = json!([
            {"id": 2, "market_type": "points", "selection_name": "B first"},
            {"id": 1, "market_type": "points", "selection_name": "A first"},
            {"id": 3, "market_type": "assists", "selection_name": "Dime"},
        ]);
        state.apply(&msg);

        let grouped = state.specials_by_market();
        assert_eq!(grouped.len(), 2);
        let points = grouped.iter().find(|(m, _)| m == "points").unwrap();
        let names: Vec<&str> = points
            .1
            .iter()
            .map(|s| s["selection_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["A first", "B first"]);
    }

    #[test]
    fn milestone_lines_prefer_the_milestone_field() {
        let mut state = BoardState::new();
        let mut msg = snapshot_msg();
        msg["players"]["7"]["markets"]["points"]["20"]["milestone_line"] = json!(25);
        state.apply(&msg);

        let lines: Vec<String> = state
            .milestone_lines("points")
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        assert_eq!(lines, ["18", "22", "25"]);
    }
}
