//! Error types for the A2ABase client

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// A single request/response call ran past its timeout
    Request,
    /// A stream produced no bytes for the idle window
    Idle,
    /// A stream exceeded its total allowed duration
    Total,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Idle => f.write_str("idle"),
            Self::Total => f.write_str("total"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing credential, bad base URL
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed create/update input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Non-2xx response, or retries exhausted (status 0 when no response was received)
    #[error("Remote error (HTTP {status}): {body}")]
    Remote { status: u16, body: String },

    /// Connection reset, refused or timed out below HTTP
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Timed out ({kind}) after {}ms", .after.as_millis())]
    Timeout { kind: TimeoutKind, after: Duration },

    #[error("Cancelled")]
    Cancelled,

    /// The run's stream was already handed out
    #[error("Stream for run {run_id} was already consumed")]
    AlreadyConsumed { run_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn remote(status: u16, body: impl Into<String>) -> Self {
        Self::Remote {
            status,
            body: body.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn timeout(kind: TimeoutKind, after: Duration) -> Self {
        Self::Timeout { kind, after }
    }

    /// HTTP status carried by a remote error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
