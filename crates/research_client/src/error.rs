use std::fmt;

use serde_json::Value;

use crate::config::ConfigError;
use crate::store::StoreError;

/// One rejected field of a request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// A backend base URL that could not be reached, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub base: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    AuthenticationFailed,
    ProviderUnavailable,
    ResourceNotFound,
    TransientFetch,
    Validation { fields: Vec<FieldError> },
    EndpointsExhausted { attempts: Vec<EndpointFailure> },
    UnexpectedStatus(u16),
    Decode,
    Storage,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::AuthenticationFailed => write!(f, "authentication failed"),
            ErrorKind::ProviderUnavailable => write!(f, "identity provider unavailable"),
            ErrorKind::ResourceNotFound => write!(f, "resource not found"),
            ErrorKind::TransientFetch => write!(f, "transient fetch error"),
            ErrorKind::Validation { fields } => {
                write!(f, "validation error ({} field(s))", fields.len())
            }
            ErrorKind::EndpointsExhausted { attempts } => {
                write!(f, "no endpoint reachable ({} tried)", attempts.len())
            }
            ErrorKind::UnexpectedStatus(code) => write!(f, "unexpected http status {code}"),
            ErrorKind::Decode => write!(f, "malformed response"),
            ErrorKind::Storage => write!(f, "local storage error"),
            ErrorKind::Config => write!(f, "configuration error"),
        }
    }
}

/// Error surfaced to consumers. `message` is always fit to show a user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn validation(field: &str, message: &str) -> Self {
        Self::new(
            ErrorKind::Validation {
                fields: vec![FieldError {
                    field: field.to_string(),
                    message: message.to_string(),
                }],
            },
            message,
        )
    }

    /// Network hiccups that a later retry may not hit.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::TransientFetch | ErrorKind::EndpointsExhausted { .. }
        )
    }

    /// Maps a non-success HTTP response to an error, preferring the backend's own wording.
    pub(crate) fn from_status(status: u16, body: &[u8], fallback: &str) -> Self {
        let message = backend_message(body).unwrap_or_else(|| fallback.to_string());
        let kind = match status {
            401 | 403 => ErrorKind::AuthenticationFailed,
            404 => ErrorKind::ResourceNotFound,
            400 | 422 => ErrorKind::Validation {
                fields: field_errors(body),
            },
            408 | 429 | 500..=599 => ErrorKind::TransientFetch,
            other => ErrorKind::UnexpectedStatus(other),
        };
        Self::new(kind, message)
    }
}

impl From<StoreError> for ClientError {
    fn from(err: StoreError) -> Self {
        Self::new(ErrorKind::Storage, err.to_string())
    }
}

impl From<ConfigError> for ClientError {
    fn from(err: ConfigError) -> Self {
        Self::new(ErrorKind::Config, err.to_string())
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        return ClientError::new(ErrorKind::TransientFetch, "The server took too long to respond.");
    }
    if err.is_decode() {
        return ClientError::new(ErrorKind::Decode, err.to_string());
    }
    ClientError::new(ErrorKind::TransientFetch, err.to_string())
}

/// First human-readable message in a backend error body:
/// `detail` as a string, the first `detail[].msg`, then `message`.
pub(crate) fn backend_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail") {
        Some(Value::String(detail)) if !detail.trim().is_empty() => {
            return Some(detail.clone());
        }
        Some(Value::Array(items)) => {
            if let Some(msg) = items
                .iter()
                .find_map(|item| item.get("msg").and_then(Value::as_str))
            {
                return Some(msg.to_string());
            }
        }
        _ => {}
    }
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(ToOwned::to_owned)
}

/// Field errors from a FastAPI-style `{"detail": [{"loc": [...], "msg": ...}]}` body.
pub(crate) fn field_errors(body: &[u8]) -> Vec<FieldError> {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return Vec::new();
    };
    let Some(items) = value.get("detail").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let message = item.get("msg")?.as_str()?.to_string();
            let field = item
                .get("loc")
                .and_then(Value::as_array)
                .map(|loc| {
                    loc.iter()
                        .filter(|part| part.as_str() != Some("body"))
                        .map(|part| match part {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(".")
                })
                .unwrap_or_default();
            Some(FieldError { field, message })
        })
        .collect()
}
