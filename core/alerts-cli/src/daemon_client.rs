//! Client for the SMN alerts daemon socket.
//!
//! The daemon is the only writer; this client reads snapshots and sends
//! settings. Failures are surfaced to the caller.

use smn_alerts_core::{AlertsError, StorageConfig, StoreSnapshot};
use smn_alerts_protocol::{Method, Request, Response, SetParams, MAX_REQUEST_BYTES};
use std::env;
use std::io::{BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const SOCKET_ENV: &str = "SMN_ALERTS_SOCKET";
const READ_TIMEOUT_MS: u64 = 2_000;
const WRITE_TIMEOUT_MS: u64 = 600;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Storage(#[from] AlertsError),

    #[error("failed to connect to daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to talk to daemon: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for daemon response")]
    Timeout,

    #[error("daemon response exceeded maximum size")]
    TooLarge,

    #[error("daemon closed the connection")]
    Closed,

    #[error("failed to parse daemon response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("daemon error {code}: {message}")]
    Daemon { code: String, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(socket: PathBuf) -> Self {
        Self { socket }
    }

    /// Uses `SMN_ALERTS_SOCKET` when set, otherwise `~/.smn-alerts/daemon.sock`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(socket_path()?))
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub fn health(&self) -> Result<serde_json::Value> {
        self.call(Method::GetHealth, None)
    }

    pub fn state(&self) -> Result<StoreSnapshot> {
        let data = self.call(Method::GetState, None)?;
        Ok(serde_json::from_value(data)?)
    }

    /// Writes settings and returns the snapshot right after the write.
    pub fn set(&self, params: SetParams) -> Result<StoreSnapshot> {
        let params = serde_json::to_value(params)?;
        let data = self.call(Method::Set, Some(params))?;
        Ok(serde_json::from_value(data)?)
    }

    /// Opens a long-lived connection that yields one snapshot per broadcast.
    pub fn subscribe(&self) -> Result<Subscription> {
        let mut stream = self.connect()?;
        write_request(&mut stream, &request(Method::Subscribe, None))?;

        // Snapshots may arrive in the same read as the response, so the
        // response line goes through the same buffered reader.
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(ClientError::Closed);
        }
        serde_json::from_str::<Response>(line.trim_end())?.into_data()?;

        reader.get_ref().set_read_timeout(None)?;
        Ok(Subscription { reader })
    }

    fn call(&self, method: Method, params: Option<serde_json::Value>) -> Result<serde_json::Value> {
        let mut stream = self.connect()?;
        write_request(&mut stream, &request(method, params))?;
        read_response(&mut stream)?.into_data()
    }

    fn connect(&self) -> Result<UnixStream> {
        let stream = UnixStream::connect(&self.socket).map_err(|source| ClientError::Connect {
            path: self.socket.clone(),
            source,
        })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));
        Ok(stream)
    }
}

pub struct Subscription {
    reader: BufReader<UnixStream>,
}

impl Iterator for Subscription {
    type Item = Result<StoreSnapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(serde_json::from_str(line.trim_end()).map_err(ClientError::from)),
            Err(err) => Some(Err(err.into())),
        }
    }
}

trait ResponseExt {
    fn into_data(self) -> Result<serde_json::Value>;
}

impl ResponseExt for Response {
    fn into_data(self) -> Result<serde_json::Value> {
        if self.ok {
            return Ok(self.data.unwrap_or(serde_json::Value::Null));
        }
        let (code, message) = self
            .error
            .map(|err| (err.code, err.message))
            .unwrap_or_else(|| ("unknown".to_string(), "Unknown daemon error".to_string()));
        Err(ClientError::Daemon { code, message })
    }
}

fn socket_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(SOCKET_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(StorageConfig::from_home()?.socket_file())
}

fn request(method: Method, params: Option<serde_json::Value>) -> Request {
    Request::new(method, Some(format!("cli-{}", std::process::id())), params)
}

fn write_request(stream: &mut UnixStream, request: &Request) -> Result<()> {
    serde_json::to_writer(&mut *stream, request)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}

fn read_response(stream: &mut UnixStream) -> Result<Response> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ClientError::TooLarge);
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
                return Err(ClientError::Timeout);
            }
            Err(err) => return Err(err.into()),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err(ClientError::Closed);
    }

    Ok(serde_json::from_slice(response_bytes)?)
}
