//! Error types for the realtime client core.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for realtime operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Main error type for the realtime client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RealtimeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("not connected")]
    NotConnected,

    #[error("transport channel closed")]
    ChannelClosed,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl RealtimeError {
    /// Classification for this error, used when surfacing it as a domain event.
    pub fn classified(&self) -> ClassifiedError {
        match self {
            RealtimeError::Network(msg) => {
                ClassifiedError::new(ErrorKind::Network, msg.clone(), true)
            }
            RealtimeError::Auth(msg) => ClassifiedError::new(ErrorKind::Auth, msg.clone(), false),
            RealtimeError::Server(msg) => {
                ClassifiedError::new(ErrorKind::Server, msg.clone(), true)
            }
            RealtimeError::Timeout(after) => ClassifiedError::new(
                ErrorKind::Timeout,
                format!("connection attempt timed out after {after:?}"),
                true,
            ),
            RealtimeError::NotConnected => {
                ClassifiedError::new(ErrorKind::Network, "not connected".to_string(), true)
            }
            RealtimeError::ChannelClosed => ClassifiedError::new(
                ErrorKind::Network,
                "transport channel closed".to_string(),
                true,
            ),
            RealtimeError::Unknown(msg) => {
                ClassifiedError::new(ErrorKind::Unknown, msg.clone(), true)
            }
        }
    }
}

impl From<ClassifiedError> for RealtimeError {
    fn from(error: ClassifiedError) -> Self {
        match error.kind {
            ErrorKind::Network => RealtimeError::Network(error.message),
            ErrorKind::Auth => RealtimeError::Auth(error.message),
            ErrorKind::Server => RealtimeError::Server(error.message),
            ErrorKind::Timeout => RealtimeError::Network(error.message),
            ErrorKind::Unknown => RealtimeError::Unknown(error.message),
        }
    }
}

/// Category assigned to a raw transport or server error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Network,
    Auth,
    Server,
    Timeout,
    Unknown,
}

/// A raw error mapped onto the five kinds the UI layer reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }
}

const AUTH_MARKERS: &[&str] = &[
    "auth",
    "unauthorized",
    "unauthorised",
    "401",
    "403",
    "forbidden",
    "invalid token",
    "token expired",
    "jwt",
    "credential",
];

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "etimedout", "deadline"];

const NETWORK_MARKERS: &[&str] = &[
    "network",
    "econnrefused",
    "econnreset",
    "enotfound",
    "enetunreach",
    "ehostunreach",
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "dns",
    "socket",
    "websocket",
    "tls",
    "handshake",
];

const SERVER_MARKERS: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "internal server",
    "bad gateway",
    "service unavailable",
    "server error",
];

/// Map a raw error string onto a [`ClassifiedError`].
///
/// The mapping is an ordered list of substring checks, first match wins:
/// auth markers take priority (so "websocket auth failed" is an auth error,
/// not a network one), then timeouts, then network faults, then server-side
/// failures. Anything unrecognized is a retryable unknown.
pub fn classify_error(raw: &str) -> ClassifiedError {
    let lowered = raw.to_lowercase();
    let matches_any = |markers: &[&str]| markers.iter().any(|marker| lowered.contains(marker));

    if matches_any(AUTH_MARKERS) {
        ClassifiedError::new(ErrorKind::Auth, raw, false)
    } else if matches_any(TIMEOUT_MARKERS) {
        ClassifiedError::new(ErrorKind::Timeout, raw, true)
    } else if matches_any(NETWORK_MARKERS) {
        ClassifiedError::new(ErrorKind::Network, raw, true)
    } else if matches_any(SERVER_MARKERS) {
        ClassifiedError::new(ErrorKind::Server, raw, true)
    } else {
        ClassifiedError::new(ErrorKind::Unknown, raw, true)
    }
}
