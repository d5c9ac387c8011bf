//! # smn-alerts-core
//!
//! Core library for SMN alerts, shared by the daemon and the CLI client.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Change notifications go out
//!   over channels; consumers decide how to await them.
//! - **Single writer**: The daemon owns the [`Store`]. Clients read snapshots
//!   and send intent through the daemon's IPC socket.
//! - **Graceful degradation**: Missing or corrupt state files fall back to
//!   defaults instead of erroring.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smn_alerts_core::{filter_alerts, Store, StoreSnapshot, StoreValue};
//!
//! let store = Store::open(&path, StoreSnapshot::default())?;
//! let mut changes = store.subscribe();
//! store.set([StoreValue::SelectedProvince(Some("Mendoza".into()))])?;
//! let snapshot = store.get();
//! let alerts = filter_alerts(snapshot.selected_province.as_deref(), &snapshot.data);
//! ```

pub mod error;
pub mod filter;
pub mod storage;
pub mod store;
pub mod types;

pub use error::{AlertsError, Result};
pub use filter::{filter_alerts, ids_changed, RESOLVED_STATUS};
pub use storage::StorageConfig;
pub use store::Store;
pub use types::*;
