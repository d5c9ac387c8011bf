//! File-backed key-value store with change notifications.
//!
//! Holds the five store keys in memory and mirrors them to
//! `~/.smn-alerts/state.json` on every write.
//!
//! # File Format
//!
//! ```json
//! {
//!   "active": true,
//!   "data": [ ... AlertRecord ... ],
//!   "delay": 1800000,
//!   "selectedProvince": "Mendoza",
//!   "alerts": [ ... AlertRecord ... ]
//! }
//! ```
//!
//! # Write Semantics
//!
//! - Last write wins per key; there is no merge below key level.
//! - One [`Store::set`] call is one durable file write followed by one
//!   [`ChangeSet`] sent to every subscriber.
//! - Writers are serialized, so subscribers observe batches in the same order
//!   they became durable.
//!
//! # Defensive Loading
//!
//! Empty or corrupt files load as the supplied defaults (logged, not fatal).
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write never leaves a partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use fs_err as fs;
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

use crate::error::{AlertsError, Result};
use crate::types::{ChangeSet, StoreSnapshot, StoreValue};

struct Inner {
    snapshot: StoreSnapshot,
    file_path: Option<PathBuf>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeSet>>,
}

/// The persisted key-value store.
///
/// Create with [`Store::open`] to back it with a file, or
/// [`Store::new_in_memory`] for tests.
pub struct Store {
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new_in_memory(initial: StoreSnapshot) -> Self {
        Self {
            inner: Mutex::new(Inner {
                snapshot: initial,
                file_path: None,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Loads the state file, or starts from `defaults` when there is none.
    ///
    /// A missing file is the first run: the defaults are written immediately.
    pub fn open(file_path: &Path, defaults: StoreSnapshot) -> Result<Self> {
        let (snapshot, needs_install) = load_snapshot(file_path, defaults)?;
        let store = Self {
            inner: Mutex::new(Inner {
                snapshot,
                file_path: Some(file_path.to_path_buf()),
                subscribers: Vec::new(),
            }),
        };

        if needs_install {
            let inner = store.lock();
            write_snapshot(file_path, &inner.snapshot)?;
            tracing::info!(path = %file_path.display(), "Initialized state file with defaults");
        }

        Ok(store)
    }

    /// Returns a copy of the current state.
    pub fn get(&self) -> StoreSnapshot {
        self.lock().snapshot.clone()
    }

    /// Writes full replacement values for one or more keys.
    ///
    /// The file is written before memory is updated and before any subscriber
    /// is told; a failed write leaves the store untouched.
    pub fn set<I>(&self, values: I) -> Result<ChangeSet>
    where
        I: IntoIterator<Item = StoreValue>,
    {
        let mut inner = self.lock();

        let mut next = inner.snapshot.clone();
        let mut changes = ChangeSet::default();
        for value in values {
            let old_value = next.apply(value.clone());
            changes.record(old_value, value);
        }

        if changes.is_empty() {
            return Ok(changes);
        }

        if let Some(path) = inner.file_path.as_ref() {
            write_snapshot(path, &next)?;
        }
        inner.snapshot = next;

        let keys: Vec<&str> = changes.keys().map(|key| key.as_str()).collect();
        tracing::debug!(keys = ?keys, "Store write committed");

        inner
            .subscribers
            .retain(|subscriber| subscriber.send(changes.clone()).is_ok());

        Ok(changes)
    }

    /// Registers a change listener. Batches arrive in commit order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeSet> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.lock().file_path.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_snapshot(file_path: &Path, defaults: StoreSnapshot) -> Result<(StoreSnapshot, bool)> {
    if !file_path.exists() {
        return Ok((defaults, true));
    }

    let content = fs::read_to_string(file_path).map_err(|source| AlertsError::Io {
        context: format!("reading state file {}", file_path.display()),
        source,
    })?;

    if content.trim().is_empty() {
        tracing::warn!(path = %file_path.display(), "Empty state file, using defaults");
        return Ok((defaults, false));
    }

    match serde_json::from_str::<StoreSnapshot>(&content) {
        Ok(snapshot) => Ok((snapshot, false)),
        Err(err) => {
            tracing::warn!(
                path = %file_path.display(),
                error = %err,
                "Failed to parse state file, using defaults"
            );
            Ok((defaults, false))
        }
    }
}

fn write_snapshot(file_path: &Path, snapshot: &StoreSnapshot) -> Result<()> {
    let content = serde_json::to_string_pretty(snapshot).map_err(|source| AlertsError::Json {
        context: "serializing state".to_string(),
        source,
    })?;

    let write_err = |source: std::io::Error| AlertsError::StoreWrite {
        path: file_path.to_path_buf(),
        source,
    };

    let parent_dir = file_path.parent().ok_or_else(|| {
        write_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "state file path has no parent directory",
        ))
    })?;
    fs::create_dir_all(parent_dir).map_err(write_err)?;

    let mut temp_file = NamedTempFile::new_in(parent_dir).map_err(write_err)?;
    temp_file.write_all(content.as_bytes()).map_err(write_err)?;
    temp_file.flush().map_err(write_err)?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(write_err)?;
    temp_file
        .persist(file_path)
        .map_err(|err| write_err(err.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertRecord, StoreKey};
    use tempfile::tempdir;

    #[test]
    fn set_reports_old_and_new_values() {
        let store = Store::new_in_memory(StoreSnapshot::default());
        let changes = store.set([StoreValue::Active(false)]).unwrap();
        let change = changes.get(StoreKey::Active).unwrap();
        assert_eq!(change.old_value, StoreValue::Active(true));
        assert_eq!(change.new_value, StoreValue::Active(false));
        assert!(!store.get().active);
    }

    #[test]
    fn identical_write_is_still_reported() {
        let store = Store::new_in_memory(StoreSnapshot::default());
        let changes = store.set([StoreValue::Active(true)]).unwrap();
        assert!(changes.contains(StoreKey::Active));
    }

    #[test]
    fn empty_set_emits_nothing() {
        let store = Store::new_in_memory(StoreSnapshot::default());
        let mut rx = store.subscribe();
        let changes = store.set(Vec::<StoreValue>::new()).unwrap();
        assert!(changes.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn subscribers_receive_one_batch_per_set() {
        let store = Store::new_in_memory(StoreSnapshot::default());
        let mut rx = store.subscribe();

        store
            .set([
                StoreValue::SelectedProvince(Some("Mendoza".to_string())),
                StoreValue::Delay(5_000),
            ])
            .unwrap();
        store.set([StoreValue::Active(false)]).unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            vec![StoreKey::Delay, StoreKey::SelectedProvince]
        );
        let second = rx.try_recv().unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec![StoreKey::Active]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let store = Store::new_in_memory(StoreSnapshot::default());
        let rx = store.subscribe();
        drop(rx);
        store.set([StoreValue::Active(false)]).unwrap();
        assert!(store.lock().subscribers.is_empty());
    }

    #[test]
    fn open_missing_file_installs_defaults() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("nested").join("state.json");

        let store = Store::open(&file, StoreSnapshot::default()).unwrap();
        assert!(file.exists());
        assert_eq!(store.get(), StoreSnapshot::default());
    }

    #[test]
    fn failed_write_leaves_store_untouched() {
        let temp = tempdir().unwrap();
        let state_dir = temp.path().join("state");
        let store = Store::open(&state_dir.join("state.json"), StoreSnapshot::default()).unwrap();
        let mut rx = store.subscribe();

        std::fs::remove_dir_all(&state_dir).unwrap();
        std::fs::write(&state_dir, "not a directory").unwrap();

        let err = store.set([StoreValue::Active(false)]).unwrap_err();
        assert!(matches!(err, AlertsError::StoreWrite { .. }));
        assert_eq!(store.get(), StoreSnapshot::default());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn persistence_round_trip() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("state.json");

        {
            let store = Store::open(&file, StoreSnapshot::default()).unwrap();
            store
                .set([
                    StoreValue::SelectedProvince(Some("Salta".to_string())),
                    StoreValue::Data(vec![AlertRecord::new("1", "Vigente", &[("a", "Salta")])]),
                ])
                .unwrap();
        }

        let store = Store::open(&file, StoreSnapshot::default()).unwrap();
        let snapshot = store.get();
        assert_eq!(snapshot.selected_province.as_deref(), Some("Salta"));
        assert_eq!(snapshot.data.len(), 1);
    }

    #[test]
    fn load_empty_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("state.json");
        std::fs::write(&file, "").unwrap();

        let mut defaults = StoreSnapshot::default();
        defaults.delay = 60_000;
        let store = Store::open(&file, defaults.clone()).unwrap();
        assert_eq!(store.get(), defaults);
    }

    #[test]
    fn load_corrupt_json_uses_defaults() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("state.json");
        std::fs::write(&file, "{invalid json}").unwrap();

        let store = Store::open(&file, StoreSnapshot::default()).unwrap();
        assert_eq!(store.get(), StoreSnapshot::default());
    }

    #[test]
    fn existing_file_wins_over_defaults() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("state.json");
        std::fs::write(&file, r#"{"active":false,"delay":120000}"#).unwrap();

        let store = Store::open(&file, StoreSnapshot::default()).unwrap();
        let snapshot = store.get();
        assert!(!snapshot.active);
        assert_eq!(snapshot.delay, 120_000);
    }
}
