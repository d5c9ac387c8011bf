//! Unix socket front end.
//!
//! One request per connection, newline-terminated JSON. `subscribe` is the
//! exception: after the `ok` response the connection stays open and receives
//! one snapshot line per UI broadcast until the client goes away. Idle
//! subscriptions read from the socket every [`HANGUP_CHECK_INTERVAL`] so a
//! closed client releases its broadcast slot without waiting for an update.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::Serialize;
use smn_alerts_core::{Store, StoreValue};
use smn_alerts_protocol::{
    parse_set_params, ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::broadcast::UiBroadcaster;
use crate::poller::Poller;

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;
const HANGUP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Everything a connection handler may touch.
pub struct IpcContext {
    pub store: Arc<Store>,
    pub poller: Arc<Poller>,
    pub broadcaster: UiBroadcaster,
    pub feed_url: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Health<'a> {
    status: &'static str,
    pid: u32,
    version: &'static str,
    protocol_version: u32,
    started_at: DateTime<Utc>,
    feed_url: &'a str,
    active: bool,
    scheduled: bool,
    ui_subscribers: usize,
}

pub fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

pub fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

/// Accepts connections on a dedicated thread, one thread per connection.
pub fn spawn_listener(listener: UnixListener, context: Arc<IpcContext>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let context = Arc::clone(&context);
                    thread::spawn(move || handle_connection(stream, &context));
                }
                Err(err) => {
                    warn!(error = %err, "Failed to accept daemon connection");
                }
            }
        }
    })
}

fn handle_connection(mut stream: UnixStream, context: &IpcContext) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_line(&mut stream, &response);
            return;
        }
    };

    debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    if request.protocol_version == PROTOCOL_VERSION && request.method == Method::Subscribe {
        stream_snapshots(stream, request.id, context);
        return;
    }

    let response = handle_request(request, context);
    let _ = write_line(&mut stream, &response);
}

fn stream_snapshots(mut stream: UnixStream, id: Option<String>, context: &IpcContext) {
    let mut updates = context.broadcaster.subscribe();
    let accepted = Response::ok(id, serde_json::json!({ "subscribed": true }));
    if write_line(&mut stream, &accepted).is_err() {
        return;
    }
    info!("UI subscriber connected");

    if let Err(err) = stream.set_read_timeout(Some(HANGUP_CHECK_INTERVAL)) {
        warn!(error = %err, "Failed to set subscriber read timeout");
        return;
    }

    loop {
        match updates.try_recv() {
            Ok(snapshot) => {
                if let Err(err) = write_line(&mut stream, &snapshot) {
                    debug!(error = %err, "UI subscriber went away");
                    break;
                }
            }
            Err(TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "UI subscriber lagged; skipping to newest snapshot");
            }
            Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Empty) => {
                if client_hung_up(&mut stream) {
                    debug!("UI subscriber closed its end");
                    break;
                }
            }
        }
    }
    info!("UI subscriber disconnected");
}

/// Waits up to the stream's read timeout for the client to close. Subscribers
/// never send after their request, so anything they do send is discarded.
fn client_hung_up(stream: &mut UnixStream) -> bool {
    let mut scratch = [0u8; 64];
    match stream.read(&mut scratch) {
        Ok(0) => true,
        Ok(_) => false,
        Err(err) => !matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        ),
    }
}

pub(crate) fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

pub(crate) fn handle_request(request: Request, context: &IpcContext) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    match request.method {
        Method::GetHealth => {
            let health = Health {
                status: "ok",
                pid: std::process::id(),
                version: env!("CARGO_PKG_VERSION"),
                protocol_version: PROTOCOL_VERSION,
                started_at: context.started_at,
                feed_url: &context.feed_url,
                active: context.store.get().active,
                scheduled: context.poller.is_scheduled(),
                ui_subscribers: context.broadcaster.subscriber_count(),
            };
            to_response(request.id, &health, "health")
        }
        Method::GetState => to_response(request.id, &context.store.get(), "state"),
        Method::Set => handle_set(request, context),
        Method::Subscribe => Response::error(
            request.id,
            "invalid_request",
            "subscribe must be the only request on its connection",
        ),
    }
}

fn handle_set(request: Request, context: &IpcContext) -> Response {
    let Some(params) = request.params else {
        return Response::error(request.id, "invalid_params", "set requires params");
    };
    let params = match parse_set_params(params) {
        Ok(params) => params,
        Err(err) => return Response::error_with_info(request.id, err),
    };

    let mut values = Vec::new();
    if let Some(active) = params.active {
        values.push(StoreValue::Active(active));
    }
    if let Some(delay) = params.delay {
        values.push(StoreValue::Delay(delay));
    }
    if let Some(province) = params.normalized_province() {
        values.push(StoreValue::SelectedProvince(province));
    }

    match context.store.set(values) {
        Ok(changes) => {
            let keys: Vec<&str> = changes.keys().map(|key| key.as_str()).collect();
            info!(keys = ?keys, "Client updated settings");
            to_response(request.id, &context.store.get(), "state")
        }
        Err(err) => Response::error(
            request.id,
            "store_error",
            format!("Failed to persist settings: {}", err),
        ),
    }
}

fn to_response<T: Serialize>(id: Option<String>, value: &T, what: &str) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize {}: {}", what, err),
        ),
    }
}

fn write_line<T: Serialize>(stream: &mut UnixStream, value: &T) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, value)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
