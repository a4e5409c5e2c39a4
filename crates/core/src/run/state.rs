//! Run state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a run as observed by the client
///
/// ```text
/// Queued -> Active -> {Completed, Failed, Cancelled}
/// Queued -> {Completed, Failed, Cancelled}
/// ```
///
/// Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        match (self, next) {
            (Self::Queued, Self::Queued) => false,
            (Self::Queued, _) => true,
            (Self::Active, Self::Queued | Self::Active) => false,
            (Self::Active, _) => true,
            _ => false,
        }
    }

    /// Move to `next` if allowed. Returns whether the state changed.
    pub fn advance(&mut self, next: RunState) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }

    /// Map a status string reported by the platform.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "queued" | "pending" | "created" => Some(Self::Queued),
            "running" | "active" | "started" | "in_progress" => Some(Self::Active),
            "completed" | "complete" | "done" | "finished" | "success" => Some(Self::Completed),
            "failed" | "error" | "errored" => Some(Self::Failed),
            "stopped" | "cancelled" | "canceled" | "aborted" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let mut state = RunState::Queued;
        assert!(state.advance(RunState::Active));
        assert!(!state.advance(RunState::Queued));
        assert!(state.advance(RunState::Completed));
        assert_eq!(state, RunState::Completed);
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for terminal in [RunState::Completed, RunState::Failed, RunState::Cancelled] {
            for next in [
                RunState::Queued,
                RunState::Active,
                RunState::Completed,
                RunState::Failed,
                RunState::Cancelled,
            ] {
                let mut state = terminal;
                assert!(!state.advance(next));
                assert_eq!(state, terminal);
            }
        }
    }

    #[test]
    fn test_from_remote() {
        assert_eq!(RunState::from_remote("running"), Some(RunState::Active));
        assert_eq!(RunState::from_remote("STOPPED"), Some(RunState::Cancelled));
        assert_eq!(RunState::from_remote("error"), Some(RunState::Failed));
        assert_eq!(RunState::from_remote("warming_up"), None);
    }
}
