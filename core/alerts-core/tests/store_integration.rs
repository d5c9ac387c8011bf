//! Integration tests for the file-backed store and alert derivation.

use smn_alerts_core::{
    filter_alerts, ids_changed, AlertRecord, StorageConfig, Store, StoreKey, StoreSnapshot,
    StoreValue,
};

const FEED_FIXTURE: &str = r#"[
  {
    "idAlert": 4021,
    "status": "Vigente",
    "title": "Tormentas fuertes",
    "zones": { "710": "Mendoza", "711": "Malargüe" }
  },
  {
    "idAlert": "4022",
    "status": "CESE",
    "title": "Viento Zonda",
    "zones": { "710": "Mendoza" }
  },
  {
    "idAlert": 4023,
    "status": "Vigente",
    "title": "Nevadas",
    "zones": { "900": "Tierra del Fuego" }
  }
]"#;

fn feed() -> Vec<AlertRecord> {
    serde_json::from_str(FEED_FIXTURE).expect("feed fixture parses")
}

#[test]
fn test_feed_fixture_keeps_unknown_fields() {
    let alerts = feed();
    assert_eq!(alerts[0].id_alert, "4021");
    assert_eq!(alerts[1].id_alert, "4022");
    assert_eq!(alerts[0].extra["title"], "Tormentas fuertes");

    let round_trip = serde_json::to_value(&alerts[0]).unwrap();
    assert_eq!(round_trip["title"], "Tormentas fuertes");
    assert_eq!(round_trip["idAlert"], "4021");
}

#[test]
fn test_derived_alerts_survive_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let storage = StorageConfig::with_root(temp_dir.path().join(".smn-alerts"));

    {
        let store = Store::open(&storage.state_file(), StoreSnapshot::default()).unwrap();
        store
            .set([
                StoreValue::Data(feed()),
                StoreValue::SelectedProvince(Some("Mendoza".to_string())),
            ])
            .unwrap();

        let snapshot = store.get();
        let derived = filter_alerts(snapshot.selected_province.as_deref(), &snapshot.data);
        assert!(ids_changed(&snapshot.alerts, &derived));
        store.set([StoreValue::Alerts(derived)]).unwrap();
    }

    let reopened = Store::open(&storage.state_file(), StoreSnapshot::default()).unwrap();
    let snapshot = reopened.get();
    let ids: Vec<&str> = snapshot.alerts.iter().map(|a| a.id_alert.as_str()).collect();
    assert_eq!(ids, vec!["4021"]);
    assert_eq!(
        snapshot.alerts,
        filter_alerts(snapshot.selected_province.as_deref(), &snapshot.data)
    );
}

#[test]
fn test_subscriber_sees_batches_in_commit_order() {
    let store = Store::new_in_memory(StoreSnapshot::default());
    let mut changes = store.subscribe();

    store.set([StoreValue::Delay(60_000)]).unwrap();
    store
        .set([StoreValue::Active(false), StoreValue::Data(feed())])
        .unwrap();

    let first = changes.try_recv().unwrap();
    assert_eq!(first.keys().collect::<Vec<_>>(), vec![StoreKey::Delay]);

    let second = changes.try_recv().unwrap();
    assert!(second.contains(StoreKey::Active));
    assert!(second.contains(StoreKey::Data));
    assert!(changes.try_recv().is_err());
}
