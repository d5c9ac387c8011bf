//! Alert filtering and change detection.
//!
//! Both functions are pure. `alerts` in the store must always equal
//! `filter_alerts(selectedProvince, data)`; the daemon re-derives it whenever
//! either input changes and uses [`ids_changed`] to decide whether the derived
//! value is worth writing.

use std::collections::HashSet;

use crate::types::AlertRecord;

/// The feed's status for an alert that has ended.
pub const RESOLVED_STATUS: &str = "cese";

/// Returns the alerts for `selected_province` that have not ended, in feed order.
///
/// A record matches when its space-joined zone names contain the province as a
/// case-insensitive substring.
pub fn filter_alerts(selected_province: Option<&str>, raw: &[AlertRecord]) -> Vec<AlertRecord> {
    let province = match selected_province {
        Some(province) if !province.is_empty() => province.to_lowercase(),
        _ => return Vec::new(),
    };
    if raw.is_empty() {
        return Vec::new();
    }

    raw.iter()
        .filter(|alert| {
            alert.zone_text().to_lowercase().contains(&province)
                && alert.status.to_lowercase() != RESOLVED_STATUS
        })
        .cloned()
        .collect()
}

/// True when the two alert sets differ by `idAlert`.
///
/// Order and non-id fields are ignored. Any length difference counts as a
/// change.
pub fn ids_changed(previous: &[AlertRecord], current: &[AlertRecord]) -> bool {
    if previous.len() != current.len() {
        return true;
    }
    let previous_ids: HashSet<&str> = previous.iter().map(|a| a.id_alert.as_str()).collect();
    let current_ids: HashSet<&str> = current.iter().map(|a| a.id_alert.as_str()).collect();
    previous_ids != current_ids
}
