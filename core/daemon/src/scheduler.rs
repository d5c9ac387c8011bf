//! Single-slot timer for the polling loop.
//!
//! At most one timer is pending at any instant. Scheduling aborts the previous
//! timer before arming the new one, under the same lock, so callers never see
//! two pending cycles.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Slot {
    pending: Option<Pending>,
    next_generation: u64,
}

#[derive(Default)]
pub struct Scheduler {
    slot: Arc<Mutex<Slot>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer that runs `on_fire` after `delay`, replacing any pending
    /// one. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        if let Some(previous) = slot.pending.take() {
            previous.handle.abort();
        }

        let generation = slot.next_generation;
        slot.next_generation = slot.next_generation.wrapping_add(1);

        let shared = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = lock(&shared);
                let current = slot
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.generation == generation);
                if !current {
                    return;
                }
                slot.pending = None;
            }
            on_fire();
        });

        slot.pending = Some(Pending { generation, handle });
    }

    /// Drops the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.slot).pending.take() {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
