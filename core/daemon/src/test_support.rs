//! Fakes shared by the daemon's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use smn_alerts_core::AlertRecord;
use tokio::sync::Notify;

use crate::feed::{FeedClient, FeedError};
use crate::notifier::{Notifier, NotifyError};

pub fn alert(id: &str, status: &str, zone: &str) -> AlertRecord {
    AlertRecord::new(id, status, &[("a", zone)])
}

pub struct FakeFeed {
    calls: AtomicUsize,
    response: Mutex<Option<Vec<AlertRecord>>>,
    gate: Option<Notify>,
}

impl FakeFeed {
    pub fn returning(alerts: Vec<AlertRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Some(alerts)),
            gate: None,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(None),
            gate: None,
        })
    }

    /// Every fetch waits for [`FakeFeed::release`] before returning.
    pub fn gated(alerts: Vec<AlertRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Some(alerts)),
            gate: Some(Notify::new()),
        })
    }

    pub fn set_response(&self, alerts: Vec<AlertRecord>) {
        *self.response.lock().unwrap() = Some(alerts);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedClient for FakeFeed {
    async fn fetch(&self) -> Result<Vec<AlertRecord>, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let response = self.response.lock().unwrap().clone();
        match response {
            Some(alerts) => Ok(alerts),
            None => Err(FeedError::Parse(
                serde_json::from_str::<Vec<AlertRecord>>("not json").unwrap_err(),
            )),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// (province, alert ids) per notification, in order.
    pub fn sent(&self) -> Vec<(String, Vec<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, province: &str, alerts: &[AlertRecord]) -> Result<(), NotifyError> {
        let ids = alerts.iter().map(|alert| alert.id_alert.clone()).collect();
        self.sent.lock().unwrap().push((province.to_string(), ids));
        Ok(())
    }
}

/// Never finishes a notification.
#[derive(Default)]
pub struct HangingNotifier {
    attempts: AtomicUsize,
}

impl HangingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _province: &str, _alerts: &[AlertRecord]) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}
