//! Core data model for fixture odds payloads.
//!
//! Upstream feeds ship loosely-typed JSON: every field may be absent, and a
//! handful arrive as either numbers or strings depending on the producer.
//! The types here keep each known field as an explicit `Option` and park
//! anything unrecognized in a flattened map, so a record survives a
//! reshape/merge round trip byte-for-byte. Absent stays absent — nothing is
//! defaulted to zero.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Canonical map key for a loosely-typed id or line value.
///
/// Mirrors JavaScript object-key coercion: numbers stringify (`20.0` → `"20"`,
/// `20.5` → `"20.5"`), strings are used verbatim, booleans stringify. Anything
/// else has no usable key.
pub fn canonical_key(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(js_number_string)
            }
        }
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn js_number_string(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// Ordered key for a balance-line map.
///
/// Stored in canonical string form but ordered numerically where possible, so
/// `{9, 10, 20.5}` iterates as a human would read the lines. Non-numeric keys
/// sort after numeric ones, lexically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey(String);

impl LineKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        canonical_key(value).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the key, if it has one.
    pub fn value(&self) -> Option<f64> {
        self.0.parse::<f64>().ok().filter(|f| f.is_finite())
    }
}

impl Ord for LineKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a
                .partial_cmp(&b)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for LineKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for LineKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LineKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self(String::deserialize(deserializer)?))
    }
}

/// One market quotation for one player at one balance/milestone line.
///
/// Every field is optional and kept as raw JSON; typed reads go through the
/// accessor methods, which encode the comparison semantics the rest of the
/// system relies on (`is_balanced` must be boolean `true`, `is_suspended`
/// must be numeric `1`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_team_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_team_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_date: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_line: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_key: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_line: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_line_over_odds: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_line_under_odds: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_over_odds: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_balanced: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_suspended: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_closed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_line_over_settlement: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_line_under_settlement: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestone_over_settlement: Option<Value>,
    /// Anything the feed sends that we don't model, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineRecord {
    /// Parse a record out of an arbitrary JSON value. Non-objects yield no
    /// record; objects always parse (unknown fields land in `extra`).
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Canonical key identifying the player this line belongs to.
    pub fn player_key(&self) -> Option<String> {
        self.player_id.as_ref().and_then(canonical_key)
    }

    /// Market type, when it is a usable string.
    pub fn market_type(&self) -> Option<&str> {
        self.market_type.as_ref().and_then(Value::as_str)
    }

    /// Canonical key for this line's position in a balance-line map.
    pub fn balance_key(&self) -> Option<LineKey> {
        self.balance_line.as_ref().and_then(LineKey::from_json)
    }

    /// Balanced means boolean `true`, nothing looser.
    pub fn balanced(&self) -> bool {
        matches!(self.is_balanced, Some(Value::Bool(true)))
    }

    /// Suspended means numeric `1`, matching the upstream convention.
    pub fn suspended(&self) -> bool {
        self.is_suspended
            .as_ref()
            .and_then(Value::as_i64)
            .map(|v| v == 1)
            .unwrap_or(false)
    }

    /// Force the balanced flag off. Writes the field even when it was
    /// absent, the same way the merge has always stamped losers.
    pub fn clear_balanced(&mut self) {
        self.is_balanced = Some(Value::Bool(false));
    }
}

/// Balance-line map: one cell (the full line record) per balance line.
pub type BalanceLineMap = BTreeMap<LineKey, LineRecord>;

/// One player's row in the fixture document.
///
/// Descriptive fields are captured from the first line record seen for the
/// player and never rewritten; later lines only touch `markets`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_team_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_team_name: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_date: Option<Value>,
    #[serde(default)]
    pub markets: BTreeMap<String, BalanceLineMap>,
}

impl PlayerEntry {
    /// Seed a player entry from the first line record seen for that player.
    pub fn from_line(line: &LineRecord) -> Self {
        Self {
            player_id: line.player_id.clone(),
            player_name: line.player_name.clone(),
            player_team_id: line.player_team_id.clone(),
            player_team_name: line.player_team_name.clone(),
            game_date: line.game_date.clone(),
            markets: BTreeMap::new(),
        }
    }

    pub fn team_name(&self) -> &str {
        self.player_team_name
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn name(&self) -> &str {
        self.player_name
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("N/A")
    }
}

/// The nested fixture aggregate broadcast to clients.
///
/// Serialized shape matches what clients key off: `players`, `isUpdate`,
/// `new_lines`, and the pass-through envelope fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FixtureDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<Value>,
    #[serde(default)]
    pub players: BTreeMap<String, PlayerEntry>,
    #[serde(rename = "isNew", skip_serializing_if = "Option::is_none")]
    pub is_new: Option<Value>,
    #[serde(rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Value>,
    /// Count of line records contributed by the triggering input. Diagnostic only.
    #[serde(default)]
    pub new_lines: usize,
    #[serde(rename = "isUpdate", skip_serializing_if = "Option::is_none")]
    pub is_update: Option<bool>,
    #[serde(rename = "updateMessageId", skip_serializing_if = "Option::is_none")]
    pub update_message_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specials: Option<Value>,
    #[serde(rename = "isSpecials", skip_serializing_if = "Option::is_none")]
    pub is_specials: Option<Value>,
}

impl FixtureDocument {
    pub fn is_update(&self) -> bool {
        self.is_update == Some(true)
    }
}

/// Full-snapshot ingestion payload: replaces the whole fixture document.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPayload {
    pub fixture_id: Option<Value>,
    pub player_lines: Vec<LineRecord>,
    pub is_new: Option<Value>,
    pub message_id: Option<Value>,
    pub specials: Option<Value>,
    pub is_specials: Option<Value>,
}

impl SnapshotPayload {
    /// Lenient extraction from an arbitrary JSON body. Missing or
    /// wrong-shaped fields degrade to absent, never to an error.
    pub fn from_value(body: &Value) -> Self {
        Self {
            fixture_id: body.get("fixture_id").cloned(),
            player_lines: lines_from_value(body.get("player_lines")),
            is_new: body.get("isNew").cloned(),
            message_id: body.get("messageId").cloned(),
            specials: body.get("specials").cloned(),
            is_specials: body.get("isSpecials").cloned(),
        }
    }
}

/// Partial-update ingestion payload: replaces one player/market sub-map.
#[derive(Debug, Clone, Default)]
pub struct UpdatePayload {
    pub player_id: Option<Value>,
    pub lines: Vec<LineRecord>,
    pub message_id: Option<Value>,
    pub specials: Option<Value>,
    pub is_specials: Option<Value>,
}

impl UpdatePayload {
    pub fn from_value(body: &Value) -> Self {
        Self {
            player_id: body.get("player_id").cloned(),
            lines: lines_from_value(body.get("lines")),
            message_id: body.get("messageId").cloned(),
            specials: body.get("specials").cloned(),
            is_specials: body.get("isSpecials").cloned(),
        }
    }

    pub fn player_key(&self) -> Option<String> {
        self.player_id.as_ref().and_then(canonical_key)
    }
}

fn lines_from_value(value: Option<&Value>) -> Vec<LineRecord> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(LineRecord::from_value).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_keys_match_js_coercion() {
        assert_eq!(canonical_key(&json!(7)), Some("7".to_string()));
        assert_eq!(canonical_key(&json!(20.0)), Some("20".to_string()));
        assert_eq!(canonical_key(&json!(20.5)), Some("20.5".to_string()));
        assert_eq!(canonical_key(&json!("007")), Some("007".to_string()));
        assert_eq!(canonical_key(&json!(-3)), Some("-3".to_string()));
        assert_eq!(canonical_key(&json!(null)), None);
        assert_eq!(canonical_key(&json!({})), None);
    }

    #[test]
    fn line_keys_order_numerically() {
        let mut keys = vec![
            LineKey::new("10"),
            LineKey::new("9"),
            LineKey::new("20.5"),
            LineKey::new("abc"),
        ];
        keys.sort();
        let order: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(order, ["9", "10", "20.5", "abc"]);
    }

    #[test]
    fn line_record_tolerates_any_object() {
        let record = LineRecord::from_value(&json!({
            "player_id": "12",
            "market_type": "points",
            "balance_line": 20.0,
            "is_balanced": true,
            "is_suspended": 0,
            "venue_altitude_m": 1600,
        }))
        .unwrap();

        assert_eq!(record.player_key().as_deref(), Some("12"));
        assert_eq!(record.market_type(), Some("points"));
        assert_eq!(record.balance_key().unwrap().as_str(), "20");
        assert!(record.balanced());
        assert!(!record.suspended());
        assert_eq!(record.extra.get("venue_altitude_m"), Some(&json!(1600)));

        // Non-objects produce no record at all.
        assert!(LineRecord::from_value(&json!(5)).is_none());
        assert!(LineRecord::from_value(&json!("line")).is_none());
    }

    #[test]
    fn flag_comparisons_are_strict() {
        let record = LineRecord::from_value(&json!({
            "is_balanced": 1,
            "is_suspended": true,
        }))
        .unwrap();

        // Numeric 1 is not boolean true, and boolean true is not numeric 1.
        assert!(!record.balanced());
        assert!(!record.suspended());
        // Both raw values are still present for round-tripping.
        assert_eq!(record.is_balanced, Some(json!(1)));
        assert_eq!(record.is_suspended, Some(json!(true)));
    }

    #[test]
    fn unknown_fields_round_trip() {
        let input = json!({
            "player_id": 3,
            "market_type": "assists",
            "balance_line": 4.5,
            "suspension_reason": {"code": "INJ", "detail": "ankle"},
        });
        let record = LineRecord::from_value(&input).unwrap();
        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(
            out.get("suspension_reason"),
            Some(&json!({"code": "INJ", "detail": "ankle"}))
        );
        // Absent fields stay absent, not null.
        assert!(out.get("balance_line_over_odds").is_none());
    }

    #[test]
    fn payloads_extract_leniently() {
        let snapshot = SnapshotPayload::from_value(&json!({
            "fixture_id": 991,
            "player_lines": [{"player_id": 1}, "garbage", {"player_id": 2}],
            "messageId": "m-1",
        }));
        assert_eq!(snapshot.player_lines.len(), 2);
        assert_eq!(snapshot.fixture_id, Some(json!(991)));

        let update = UpdatePayload::from_value(&json!({"player_id": 7}));
        assert_eq!(update.player_key().as_deref(), Some("7"));
        assert!(update.lines.is_empty());
    }
}
