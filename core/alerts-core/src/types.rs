//! Core types shared by the daemon and its clients.
//!
//! The five store keys (`active`, `data`, `delay`, `selectedProvince`,
//! `alerts`) are the whole persisted state and the whole cross-component
//! message contract. Their wire names are camelCase to match the feed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DEFAULT_DELAY_MS: u64 = 30 * 60 * 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// Feed Records
// ═══════════════════════════════════════════════════════════════════════════════

/// One alert from the SMN feed.
///
/// Only `idAlert`, `status` and `zones` are interpreted. Every other field is
/// kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "idAlert", deserialize_with = "deserialize_alert_id")]
    pub id_alert: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub zones: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlertRecord {
    pub fn new(id_alert: &str, status: &str, zones: &[(&str, &str)]) -> Self {
        Self {
            id_alert: id_alert.to_string(),
            status: status.to_string(),
            zones: zones
                .iter()
                .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                .collect(),
            extra: Map::new(),
        }
    }

    /// Zone names joined with single spaces, in map order.
    pub fn zone_text(&self) -> String {
        self.zones
            .values()
            .map(|value| match value {
                Value::String(name) => name.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// The live feed has served numeric ids; normalize them to strings.
fn deserialize_alert_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "idAlert must be a string or number, got {}",
            other
        ))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Keys and Values
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreKey {
    Active,
    Data,
    Delay,
    SelectedProvince,
    Alerts,
}

impl StoreKey {
    pub const ALL: [StoreKey; 5] = [
        StoreKey::Active,
        StoreKey::Data,
        StoreKey::Delay,
        StoreKey::SelectedProvince,
        StoreKey::Alerts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Active => "active",
            StoreKey::Data => "data",
            StoreKey::Delay => "delay",
            StoreKey::SelectedProvince => "selectedProvince",
            StoreKey::Alerts => "alerts",
        }
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A full replacement value for one store key.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Active(bool),
    Data(Vec<AlertRecord>),
    Delay(u64),
    SelectedProvince(Option<String>),
    Alerts(Vec<AlertRecord>),
}

impl StoreValue {
    pub fn key(&self) -> StoreKey {
        match self {
            StoreValue::Active(_) => StoreKey::Active,
            StoreValue::Data(_) => StoreKey::Data,
            StoreValue::Delay(_) => StoreKey::Delay,
            StoreValue::SelectedProvince(_) => StoreKey::SelectedProvince,
            StoreValue::Alerts(_) => StoreKey::Alerts,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StoreValue::Active(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[AlertRecord]> {
        match self {
            StoreValue::Data(records) | StoreValue::Alerts(records) => Some(records),
            _ => None,
        }
    }

    pub fn as_province(&self) -> Option<&str> {
        match self {
            StoreValue::SelectedProvince(value) => value.as_deref(),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot
// ═══════════════════════════════════════════════════════════════════════════════

/// The whole persisted state. This is also the body of the state file and the
/// payload broadcast to UI subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub data: Vec<AlertRecord>,
    #[serde(default = "default_delay")]
    pub delay: u64,
    #[serde(default)]
    pub selected_province: Option<String>,
    #[serde(default)]
    pub alerts: Vec<AlertRecord>,
}

fn default_active() -> bool {
    true
}

fn default_delay() -> u64 {
    DEFAULT_DELAY_MS
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            active: default_active(),
            data: Vec::new(),
            delay: default_delay(),
            selected_province: None,
            alerts: Vec::new(),
        }
    }
}

impl StoreSnapshot {
    pub fn value(&self, key: StoreKey) -> StoreValue {
        match key {
            StoreKey::Active => StoreValue::Active(self.active),
            StoreKey::Data => StoreValue::Data(self.data.clone()),
            StoreKey::Delay => StoreValue::Delay(self.delay),
            StoreKey::SelectedProvince => {
                StoreValue::SelectedProvince(self.selected_province.clone())
            }
            StoreKey::Alerts => StoreValue::Alerts(self.alerts.clone()),
        }
    }

    /// Overwrites one key and returns the value it replaced.
    pub fn apply(&mut self, value: StoreValue) -> StoreValue {
        match value {
            StoreValue::Active(next) => StoreValue::Active(std::mem::replace(&mut self.active, next)),
            StoreValue::Data(next) => StoreValue::Data(std::mem::replace(&mut self.data, next)),
            StoreValue::Delay(next) => StoreValue::Delay(std::mem::replace(&mut self.delay, next)),
            StoreValue::SelectedProvince(next) => StoreValue::SelectedProvince(std::mem::replace(
                &mut self.selected_province,
                next,
            )),
            StoreValue::Alerts(next) => {
                StoreValue::Alerts(std::mem::replace(&mut self.alerts, next))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Change Notifications
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub old_value: StoreValue,
    pub new_value: StoreValue,
}

/// Everything one `set` call wrote, keyed by store key.
///
/// Keys are reported whenever they are written, even if the value is equal to
/// the previous one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<StoreKey, Change>,
}

impl ChangeSet {
    pub fn get(&self, key: StoreKey) -> Option<&Change> {
        self.changes.get(&key)
    }

    pub fn contains(&self, key: StoreKey) -> bool {
        self.changes.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = StoreKey> + '_ {
        self.changes.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StoreKey, &Change)> {
        self.changes.iter().map(|(key, change)| (*key, change))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Records a write. A second write to the same key keeps the first old
    /// value and the latest new value.
    pub fn record(&mut self, old_value: StoreValue, new_value: StoreValue) {
        let key = new_value.key();
        match self.changes.get_mut(&key) {
            Some(existing) => existing.new_value = new_value,
            None => {
                self.changes.insert(
                    key,
                    Change {
                        old_value,
                        new_value,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alert_record_keeps_opaque_fields() {
        let raw = json!({
            "idAlert": "a-1",
            "status": "Vigente",
            "zones": { "1": "Mendoza Norte" },
            "title": "Tormentas",
            "severity": 2
        });
        let record: AlertRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(record.id_alert, "a-1");
        assert_eq!(record.extra.get("title"), Some(&json!("Tormentas")));

        let encoded = serde_json::to_value(&record).unwrap();
        assert_eq!(encoded, raw);
    }

    #[test]
    fn alert_record_accepts_numeric_id() {
        let record: AlertRecord =
            serde_json::from_value(json!({ "idAlert": 42, "status": "Vigente", "zones": {} }))
                .unwrap();
        assert_eq!(record.id_alert, "42");
    }

    #[test]
    fn alert_record_rejects_missing_id() {
        let result: Result<AlertRecord, _> =
            serde_json::from_value(json!({ "status": "Vigente", "zones": {} }));
        assert!(result.is_err());
    }

    #[test]
    fn zone_text_joins_values() {
        let record = AlertRecord::new("1", "Vigente", &[("a", "Gran Mendoza"), ("b", "Lavalle")]);
        assert_eq!(record.zone_text(), "Gran Mendoza Lavalle");
    }

    #[test]
    fn snapshot_defaults_fill_missing_keys() {
        let snapshot: StoreSnapshot =
            serde_json::from_value(json!({ "selectedProvince": "Salta" })).unwrap();
        assert!(snapshot.active);
        assert_eq!(snapshot.delay, DEFAULT_DELAY_MS);
        assert_eq!(snapshot.selected_province.as_deref(), Some("Salta"));
        assert!(snapshot.data.is_empty());
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let encoded = serde_json::to_value(StoreSnapshot::default()).unwrap();
        let object = encoded.as_object().unwrap();
        for key in StoreKey::ALL {
            assert!(object.contains_key(key.as_str()), "missing {}", key);
        }
        assert_eq!(object.len(), StoreKey::ALL.len());
    }

    #[test]
    fn apply_returns_previous_value() {
        let mut snapshot = StoreSnapshot::default();
        let old = snapshot.apply(StoreValue::Active(false));
        assert_eq!(old, StoreValue::Active(true));
        assert!(!snapshot.active);
        assert_eq!(snapshot.value(StoreKey::Active), StoreValue::Active(false));
    }

    #[test]
    fn change_set_merges_repeated_key() {
        let mut changes = ChangeSet::default();
        changes.record(StoreValue::Delay(1), StoreValue::Delay(2));
        changes.record(StoreValue::Delay(2), StoreValue::Delay(3));
        let change = changes.get(StoreKey::Delay).unwrap();
        assert_eq!(change.old_value, StoreValue::Delay(1));
        assert_eq!(change.new_value, StoreValue::Delay(3));
        assert_eq!(changes.len(), 1);
    }
}
