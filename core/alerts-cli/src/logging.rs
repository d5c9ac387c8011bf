//! File logging for the CLI.
//!
//! Stdout belongs to command output, so logs go to a daily file under
//! `~/.smn-alerts/logs/`. The returned guard flushes the writer on drop and
//! must live until the process exits.

use smn_alerts_core::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "smn-alerts.log";
const DEBUG_ENV: &str = "SMN_ALERTS_DEBUG_LOG";

pub fn init() -> Option<WorkerGuard> {
    let storage = StorageConfig::from_home().ok()?;
    let logs_dir = storage.logs_dir();
    fs_err::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = if debug_enabled() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;

    Some(guard)
}

fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}
