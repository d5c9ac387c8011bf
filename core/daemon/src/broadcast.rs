//! Snapshot fan-out to UI clients.
//!
//! Every `alerts` write publishes the full store snapshot. Subscribers that
//! fall behind skip to newer snapshots; each one is complete on its own.

use smn_alerts_core::StoreSnapshot;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Clone)]
pub struct UiBroadcaster {
    tx: broadcast::Sender<StoreSnapshot>,
}

impl Default for UiBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Returns how many subscribers received the snapshot.
    pub fn publish(&self, snapshot: StoreSnapshot) -> usize {
        // No subscribers is the common case, not an error.
        self.tx.send(snapshot).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
