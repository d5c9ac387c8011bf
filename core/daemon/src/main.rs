//! SMN alerts daemon entrypoint.
//!
//! A small, single-writer service: it polls the SMN alert feed, owns the
//! persisted state, derives the alerts for the selected province, raises
//! desktop notifications and serves clients over a Unix socket.

use fs_err as fs;
use std::env;
use std::os::unix::net::UnixListener;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use smn_alerts_core::{StorageConfig, Store};

mod broadcast;
mod config;
mod dispatcher;
mod feed;
mod ipc;
mod notifier;
mod poller;
mod scheduler;
#[cfg(test)]
mod test_support;

use broadcast::UiBroadcaster;
use config::{load_config, DaemonConfig, NotifierKind};
use dispatcher::Dispatcher;
use feed::HttpFeedClient;
use ipc::IpcContext;
use notifier::{DesktopNotifier, LogNotifier, Notifier};
use poller::Poller;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let storage = match StorageConfig::from_home() {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "Failed to resolve state directory");
            std::process::exit(1);
        }
    };

    let mut config = match load_config(&storage.daemon_config_file()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load daemon config; using defaults");
            DaemonConfig::default()
        }
    };
    config.apply_env_overrides();

    let socket_path = storage.socket_file();
    if let Err(err) = ipc::prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = ipc::remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let store = match Store::open(&storage.state_file(), config.initial_snapshot()) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(error = %err, "Failed to open state store");
            std::process::exit(1);
        }
    };
    let changes = store.subscribe();

    let feed = match HttpFeedClient::new(
        config.feed_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ) {
        Ok(feed) => feed,
        Err(err) => {
            error!(error = %err, "Failed to build feed client");
            std::process::exit(1);
        }
    };

    debug!(url = feed.url(), timeout_secs = config.request_timeout_secs, "Feed client ready");

    let notifier: Arc<dyn Notifier> = match config.notifier {
        NotifierKind::Desktop => Arc::new(DesktopNotifier::new(config.icon.clone())),
        NotifierKind::Log => Arc::new(LogNotifier::new(config.icon.clone())),
    };

    let poller = Poller::new(Arc::clone(&store), Arc::new(feed));
    let broadcaster = UiBroadcaster::new();
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        Arc::clone(&poller),
        notifier,
        broadcaster.clone(),
    );

    ipc::spawn_listener(
        listener,
        Arc::new(IpcContext {
            store: Arc::clone(&store),
            poller: Arc::clone(&poller),
            broadcaster,
            feed_url: config.feed_url.clone(),
            started_at: chrono::Utc::now(),
        }),
    );

    let snapshot = store.get();
    info!(
        path = %socket_path.display(),
        feed_url = %config.feed_url,
        notifier = ?config.notifier,
        active = snapshot.active,
        delay_ms = snapshot.delay,
        "SMN alerts daemon started"
    );

    // One fetch at startup regardless of `active`; the cycle only reschedules
    // itself when active.
    poller.start_cycle();

    tokio::select! {
        _ = dispatcher.run(changes) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "Failed to listen for shutdown signal");
            }
            info!("Shutting down");
        }
    }

    poller.cancel();
    if let Err(err) = fs::remove_file(&socket_path) {
        warn!(error = %err, "Failed to remove daemon socket on shutdown");
    }
}

fn init_logging() {
    let debug_enabled = env::var("SMN_ALERTS_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
