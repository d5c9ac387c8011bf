//! IPC protocol types and validation for smn-alerts-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB
pub const MIN_DELAY_MS: u64 = 1_000;
pub const MAX_PROVINCE_CHARS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetState,
    Set,
    Subscribe,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, id: Option<String>, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

/// User intent written through the daemon. Only the settings keys are
/// client-writable; `data` and `alerts` belong to the daemon.
///
/// An empty `selectedProvince` clears the selection.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SetParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_province: Option<String>,
}

impl SetParams {
    pub fn validate(&self) -> Result<(), ErrorInfo> {
        if self.active.is_none() && self.delay.is_none() && self.selected_province.is_none() {
            return Err(ErrorInfo::new(
                "invalid_params",
                "at least one of active, delay, selectedProvince is required",
            ));
        }

        if let Some(delay) = self.delay {
            if delay < MIN_DELAY_MS {
                return Err(ErrorInfo::new(
                    "invalid_delay",
                    format!("delay must be at least {} ms", MIN_DELAY_MS),
                ));
            }
        }

        if let Some(province) = &self.selected_province {
            if province.trim().chars().count() > MAX_PROVINCE_CHARS {
                return Err(ErrorInfo::new(
                    "invalid_province",
                    format!(
                        "selectedProvince must be {} characters or fewer",
                        MAX_PROVINCE_CHARS
                    ),
                ));
            }
        }

        Ok(())
    }

    /// The province to store: trimmed, with blank meaning "no selection".
    pub fn normalized_province(&self) -> Option<Option<String>> {
        self.selected_province.as_ref().map(|value| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }
}

pub fn parse_set_params(params: Value) -> Result<SetParams, ErrorInfo> {
    let parsed: SetParams = serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("set payload is invalid JSON: {}", err),
        )
    })?;
    parsed.validate()?;
    Ok(parsed)
}
