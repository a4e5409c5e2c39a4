//! Stream event types for run output

use std::fmt;

use serde::{Deserialize, Serialize};

use super::RunState;
use crate::TimeoutKind;

/// Discriminant of a [`StreamEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Token,
    ToolCall,
    ToolResult,
    Status,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Token => "token",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::Status => "status",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Status reported inside the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatusUpdate {
    Running,
    Completed,
    Failed,
    Cancelled,
    /// Non-terminal status this client has no name for, kept verbatim
    #[serde(untagged)]
    Other(String),
}

impl RunStatusUpdate {
    pub fn parse(raw: &str) -> Self {
        match RunState::from_remote(raw) {
            Some(RunState::Queued) | Some(RunState::Active) => Self::Running,
            Some(RunState::Completed) => Self::Completed,
            Some(RunState::Failed) => Self::Failed,
            Some(RunState::Cancelled) => Self::Cancelled,
            None => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn terminal_state(&self) -> Option<RunState> {
        match self {
            Self::Completed => Some(RunState::Completed),
            Self::Failed => Some(RunState::Failed),
            Self::Cancelled => Some(RunState::Cancelled),
            Self::Running | Self::Other(_) => None,
        }
    }
}

/// Where an error event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOrigin {
    /// The platform reported the error in the stream
    Service,
    /// A single record could not be decoded; the stream continues
    Decode,
    /// The connection dropped or the stream became undecodable
    Transport,
    /// The stream went idle or ran past its total deadline
    Timeout,
}

/// One ordered unit of run output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant text
    Token { text: String },

    /// The agent invoked a tool
    ToolCall {
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },

    /// A tool returned
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default)]
        output: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
    },

    /// Run status changed
    Status {
        status: RunStatusUpdate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Something went wrong
    Error {
        origin: ErrorOrigin,
        message: String,
        /// Offending record, for decode errors
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw: Option<String>,
    },
}

impl StreamEvent {
    pub fn token(text: impl Into<String>) -> Self {
        Self::Token { text: text.into() }
    }

    pub fn status(status: RunStatusUpdate) -> Self {
        Self::Status {
            status,
            message: None,
        }
    }

    pub fn service_error(message: impl Into<String>) -> Self {
        Self::Error {
            origin: ErrorOrigin::Service,
            message: message.into(),
            raw: None,
        }
    }

    pub fn decode_error(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Error {
            origin: ErrorOrigin::Decode,
            message: message.into(),
            raw: Some(raw.into()),
        }
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::Error {
            origin: ErrorOrigin::Transport,
            message: message.into(),
            raw: None,
        }
    }

    pub fn timeout_error(kind: TimeoutKind, message: impl Into<String>) -> Self {
        Self::Error {
            origin: ErrorOrigin::Timeout,
            message: format!("{} timeout: {}", kind, message.into()),
            raw: None,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Token { .. } => EventKind::Token,
            Self::ToolCall { .. } => EventKind::ToolCall,
            Self::ToolResult { .. } => EventKind::ToolResult,
            Self::Status { .. } => EventKind::Status,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// The run state this event ends the run in, if it is terminal.
    ///
    /// Decode errors are not terminal; every other error is.
    pub fn terminal_state(&self) -> Option<RunState> {
        match self {
            Self::Status { status, .. } => status.terminal_state(),
            Self::Error { origin, .. } => match origin {
                ErrorOrigin::Decode => None,
                ErrorOrigin::Service | ErrorOrigin::Transport | ErrorOrigin::Timeout => {
                    Some(RunState::Failed)
                }
            },
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal_state().is_some()
    }
}
