//! Store change dispatch.
//!
//! The daemon holds exactly one store subscription. Each committed batch is
//! routed key by key through [`handler_for`]; handlers never depend on the
//! order in which other keys of the same batch are handled.
//!
//! ```text
//!   poller ──write data──▶ DataChanged ──write alerts──▶ AlertsChanged ──▶ UI + notifier
//!   client ──write selectedProvince──▶ ProvinceChanged ──write alerts──┘
//!   client ──write active──▶ ToggleActivation ──▶ start / cancel polling
//! ```

use std::sync::Arc;
use std::time::Duration;

use smn_alerts_core::{
    filter_alerts, ids_changed, Change, ChangeSet, Store, StoreKey, StoreValue,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::broadcast::UiBroadcaster;
use crate::notifier::Notifier;
use crate::poller::Poller;

/// Upper bound on one notification. Dispatch is sequential, so a hung
/// notifier would otherwise hold back every later batch.
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    ToggleActivation,
    DataChanged,
    ProvinceChanged,
    AlertsChanged,
}

/// Key → handler table. `delay` has no handler; a new delay is picked up the
/// next time a cycle is scheduled.
pub const fn handler_for(key: StoreKey) -> Option<Handler> {
    match key {
        StoreKey::Active => Some(Handler::ToggleActivation),
        StoreKey::Data => Some(Handler::DataChanged),
        StoreKey::SelectedProvince => Some(Handler::ProvinceChanged),
        StoreKey::Alerts => Some(Handler::AlertsChanged),
        StoreKey::Delay => None,
    }
}

pub struct Dispatcher {
    store: Arc<Store>,
    poller: Arc<Poller>,
    notifier: Arc<dyn Notifier>,
    broadcaster: UiBroadcaster,
}

impl Dispatcher {
    pub fn new(
        store: Arc<Store>,
        poller: Arc<Poller>,
        notifier: Arc<dyn Notifier>,
        broadcaster: UiBroadcaster,
    ) -> Self {
        Self {
            store,
            poller,
            notifier,
            broadcaster,
        }
    }

    /// Consumes change batches until the store drops its sender.
    pub async fn run(&self, mut changes: mpsc::UnboundedReceiver<ChangeSet>) {
        while let Some(batch) = changes.recv().await {
            self.dispatch(&batch).await;
        }
        info!("Store change stream closed; dispatcher stopping");
    }

    pub async fn dispatch(&self, changes: &ChangeSet) {
        for (key, change) in changes.iter() {
            let Some(handler) = handler_for(key) else {
                debug!(key = %key, "No handler for store key");
                continue;
            };
            match handler {
                Handler::ToggleActivation => self.on_active_changed(change),
                Handler::DataChanged => self.on_data_changed(change),
                Handler::ProvinceChanged => self.on_province_changed(change),
                Handler::AlertsChanged => self.on_alerts_changed(change).await,
            }
        }
    }

    fn on_active_changed(&self, change: &Change) {
        let old = change.old_value.as_bool();
        let new = change.new_value.as_bool();
        if old == new {
            debug!(active = ?new, "Activation rewritten with the same value");
            return;
        }

        if new == Some(true) {
            info!("Polling activated");
            self.poller.start_cycle();
        } else {
            info!("Polling deactivated");
            self.poller.cancel();
        }
    }

    fn on_data_changed(&self, change: &Change) {
        let old = change.old_value.as_records().unwrap_or_default();
        let new = change.new_value.as_records().unwrap_or_default();
        if ids_changed(old, new) {
            debug!(previous = old.len(), current = new.len(), "Feed alert ids changed");
            self.refresh_alerts();
        }
    }

    fn on_province_changed(&self, change: &Change) {
        match change.new_value.as_province() {
            Some(province) if !province.is_empty() => {
                debug!(province, "Selected province changed");
                self.refresh_alerts();
            }
            _ => debug!("Selected province cleared"),
        }
    }

    async fn on_alerts_changed(&self, change: &Change) {
        let snapshot = self.store.get();
        let receivers = self.broadcaster.publish(snapshot.clone());
        debug!(receivers, "Published snapshot to UI subscribers");

        let alerts = change.new_value.as_records().unwrap_or_default();
        if alerts.is_empty() {
            return;
        }

        let province = snapshot.selected_province.as_deref().unwrap_or_default();
        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.notify(province, alerts)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, province, "Failed to show alert notification"),
            Err(_) => warn!(
                timeout_ms = NOTIFY_TIMEOUT.as_millis() as u64,
                province,
                "Alert notification timed out"
            ),
        }
    }

    /// Re-derives `alerts` from the current snapshot and writes it only when
    /// the id set differs from what is stored.
    fn refresh_alerts(&self) {
        let snapshot = self.store.get();
        let computed = filter_alerts(snapshot.selected_province.as_deref(), &snapshot.data);
        if !ids_changed(&snapshot.alerts, &computed) {
            debug!(count = computed.len(), "Filtered alerts unchanged");
            return;
        }

        info!(
            province = ?snapshot.selected_province,
            count = computed.len(),
            "Filtered alerts changed"
        );
        if let Err(err) = self.store.set([StoreValue::Alerts(computed)]) {
            error!(error = %err, "Failed to persist filtered alerts");
        }
    }
}
