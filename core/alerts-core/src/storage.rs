//! Storage configuration and path management for SMN alerts.
//!
//! All file paths used by the daemon and the CLI are decided here, so tests
//! can point everything at a temp directory with [`StorageConfig::with_root`].

use std::path::{Path, PathBuf};

use crate::error::{AlertsError, Result};

const ROOT_DIR_NAME: &str = ".smn-alerts";

/// Central configuration for all SMN alerts storage paths.
///
/// Production code uses [`StorageConfig::from_home`] which points to
/// `~/.smn-alerts/`. Tests use [`StorageConfig::with_root`] for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(AlertsError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(ROOT_DIR_NAME),
        })
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persisted key-value state (the five store keys).
    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn socket_file(&self) -> PathBuf {
        self.root.join("daemon.sock")
    }

    pub fn daemon_config_file(&self) -> PathBuf {
        self.root.join("daemon.toml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
