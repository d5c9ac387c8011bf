//! Daemon runtime configuration.
//!
//! Read from `~/.smn-alerts/daemon.toml` when present, then overridden by
//! environment variables. A missing file is not an error.
//!
//! ```toml
//! feed_url = "https://ws.smn.gob.ar/alerts/"
//! request_timeout_secs = 20
//! notifier = "desktop"   # or "log"
//! icon = "weather-icon.png"
//! initial_delay_ms = 1800000
//! initial_active = true
//! ```

use std::path::Path;

use serde::Deserialize;
use smn_alerts_core::{AlertsError, StoreSnapshot, DEFAULT_DELAY_MS};

pub const DEFAULT_FEED_URL: &str = "https://ws.smn.gob.ar/alerts/";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
const DEFAULT_ICON: &str = "weather-icon.png";

const FEED_URL_ENV: &str = "SMN_ALERTS_FEED_URL";
const NOTIFIER_ENV: &str = "SMN_ALERTS_NOTIFIER";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    Desktop,
    Log,
}

impl NotifierKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(Self::Desktop),
            "log" => Some(Self::Log),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub feed_url: String,
    pub request_timeout_secs: u64,
    pub notifier: NotifierKind,
    pub icon: String,
    /// Only used when the state file is created for the first time.
    pub initial_delay_ms: u64,
    /// Only used when the state file is created for the first time.
    pub initial_active: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            notifier: NotifierKind::Desktop,
            icon: DEFAULT_ICON.to_string(),
            initial_delay_ms: DEFAULT_DELAY_MS,
            initial_active: true,
        }
    }
}

impl DaemonConfig {
    /// State written on first start.
    pub fn initial_snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            active: self.initial_active,
            delay: self.initial_delay_ms,
            ..StoreSnapshot::default()
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(FEED_URL_ENV).filter(|value| !value.trim().is_empty()) {
            self.feed_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(NOTIFIER_ENV) {
            match NotifierKind::parse(&raw) {
                Some(kind) => self.notifier = kind,
                None => tracing::warn!(value = %raw, "Ignoring unknown notifier override"),
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<DaemonConfig, AlertsError> {
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| AlertsError::Io {
        context: format!("reading daemon config {}", path.display()),
        source,
    })?;
    toml::from_str::<DaemonConfig>(&content).map_err(|err| AlertsError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
