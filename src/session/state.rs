//! Session state machine.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Current state of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No turn has bound a session id yet.
    #[default]
    Created,
    /// A turn is running.
    InFlight,
    /// A session id is bound; the next turn resumes it.
    Active,
    /// Terminal.
    Aborted,
}

/// State machine for tracking session progress.
#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    state: SessionState,
    turns: u64,
    failures: u64,
}

impl SessionStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, new_state: SessionState) {
        tracing::debug!(from = ?self.state, to = ?new_state, "State transition");
        self.state = new_state;
    }

    /// Enter `InFlight`, returning the state to fall back to on failure.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::SessionClosed` once aborted.
    pub fn begin_turn(&mut self) -> Result<SessionState> {
        if self.state == SessionState::Aborted {
            return Err(AgentError::SessionClosed);
        }
        let previous = self.state;
        self.transition(SessionState::InFlight);
        Ok(previous)
    }

    /// Settle a successful turn. `bound` says whether a session id is known.
    pub fn complete_turn(&mut self, previous: SessionState, bound: bool) {
        self.turns = self.turns.saturating_add(1);
        if self.state == SessionState::Aborted {
            return;
        }
        self.transition(if bound { SessionState::Active } else { previous });
    }

    /// Settle a failed turn back to `previous`.
    pub fn fail_turn(&mut self, previous: SessionState) {
        self.failures = self.failures.saturating_add(1);
        if self.state == SessionState::Aborted {
            return;
        }
        self.transition(previous);
    }

    /// Enter `Aborted`. Returns false if already there.
    pub fn abort(&mut self) -> bool {
        if self.state == SessionState::Aborted {
            return false;
        }
        self.transition(SessionState::Aborted);
        true
    }

    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            turns: self.turns,
            failures: self.failures,
        }
    }
}

/// Session statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub turns: u64,
    pub failures: u64,
}
