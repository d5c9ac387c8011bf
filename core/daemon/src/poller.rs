//! The polling loop.
//!
//! A cycle reads the store, fetches the feed once, writes `data`, then arms
//! the next cycle through the [`Scheduler`] if `active` is still true. Feed
//! failures are swallowed: the cycle writes an empty `data` and the next
//! attempt is the next scheduled cycle.
//!
//! ```text
//!            start_cycle()                 timer fires
//!   Idle ─────────────────▶ (fetching) ◀──────────────── Scheduled
//!    ▲                          │                            ▲
//!    │   active == false        │  write data                │ active == true
//!    └──────────────────────────┴────────────────────────────┘
//! ```
//!
//! In-flight fetches are never cancelled; deactivation only drops the pending
//! timer.

use std::sync::Arc;
use std::time::Duration;

use smn_alerts_core::{Store, StoreValue};
use smn_alerts_protocol::MIN_DELAY_MS;
use tracing::{debug, error, info, warn};

use crate::feed::FeedClient;
use crate::scheduler::Scheduler;

pub struct Poller {
    store: Arc<Store>,
    feed: Arc<dyn FeedClient>,
    scheduler: Scheduler,
}

impl Poller {
    pub fn new(store: Arc<Store>, feed: Arc<dyn FeedClient>) -> Arc<Self> {
        Arc::new(Self {
            store,
            feed,
            scheduler: Scheduler::new(),
        })
    }

    /// Spawns a cycle now. The pending timer, if any, is left to the cycle to
    /// replace once it completes.
    pub fn start_cycle(self: &Arc<Self>) {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            poller.run_cycle().await;
        });
    }

    /// Drops the pending timer so no further cycle runs until reactivated.
    pub fn cancel(&self) {
        if self.scheduler.cancel() {
            info!("Polling paused; pending cycle cancelled");
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_scheduled()
    }

    pub async fn run_cycle(self: Arc<Self>) {
        let data = match self.feed.fetch().await {
            Ok(alerts) => {
                debug!(count = alerts.len(), "Fetched alert feed");
                alerts
            }
            Err(err) => {
                warn!(error = %err, "Alert feed fetch failed; storing empty data");
                Vec::new()
            }
        };

        if let Err(err) = self.store.set([StoreValue::Data(data)]) {
            error!(error = %err, "Failed to persist fetched alerts");
        }

        // Read after the write so a deactivation that landed mid-fetch wins.
        let snapshot = self.store.get();
        self.reschedule(snapshot.active, Duration::from_millis(snapshot.delay));
    }

    fn reschedule(self: &Arc<Self>, active: bool, delay: Duration) {
        self.scheduler.cancel();
        if !active {
            debug!("Polling inactive; not scheduling another cycle");
            return;
        }

        // Hand-edited state files and configs bypass the IPC floor.
        let floor = Duration::from_millis(MIN_DELAY_MS);
        let delay = if delay < floor {
            warn!(
                delay_ms = delay.as_millis() as u64,
                min_delay_ms = MIN_DELAY_MS,
                "Delay below minimum; using the minimum"
            );
            floor
        } else {
            delay
        };

        let poller = Arc::clone(self);
        self.scheduler.schedule(delay, move || poller.start_cycle());
        debug!(delay_ms = delay.as_millis() as u64, "Next cycle scheduled");
    }
}
