// SPDX-License-Identifier: MIT

//! Session entity (§3 Session).
//!
//! A `Session` observes its backing `Process` only through a supervisor-
//! issued [`ProcessId`] (§9 weak-reference redesign): the process is owned
//! exclusively by the `ProcessSupervisor`, never by the session.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::state::SessionState;
use fleet_core::{ProcessId, SessionId};
use parking_lot::Mutex;
use serde_json::{Map, Value};

pub struct Session {
    pub id: SessionId,
    pub workspace_id: String,
    pub user_id: String,
    config: Mutex<SessionConfig>,
    state: Mutex<SessionState>,
    process_id: Mutex<Option<ProcessId>>,
    created_at_ms: u64,
    last_active_ms: Mutex<u64>,
    metadata: Mutex<Map<String, Value>>,
}

impl Session {
    pub fn new(
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
        config: SessionConfig,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id: SessionId::new(),
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            config: Mutex::new(config),
            state: Mutex::new(SessionState::Created),
            process_id: Mutex::new(None),
            created_at_ms: epoch_ms,
            last_active_ms: Mutex::new(epoch_ms),
            metadata: Mutex::new(Map::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn config(&self) -> SessionConfig {
        self.config.lock().clone()
    }

    pub fn process_id(&self) -> Option<ProcessId> {
        *self.process_id.lock()
    }

    pub fn set_process_id(&self, id: Option<ProcessId>) {
        *self.process_id.lock() = id;
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    pub fn last_active_ms(&self) -> u64 {
        *self.last_active_ms.lock()
    }

    pub fn touch(&self, epoch_ms: u64) {
        *self.last_active_ms.lock() = epoch_ms;
    }

    pub fn metadata(&self) -> Map<String, Value> {
        self.metadata.lock().clone()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        self.metadata.lock().insert(key.into(), value);
    }

    /// Guarded state mutation (§3 invariant: "transitions restricted to the
    /// adjacency list defined in §4.2").
    pub fn transition(&self, to: SessionState) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        if !state.can_transition_to(to) {
            return Err(SessionError::InvalidTransition { from: *state, to });
        }
        *state = to;
        Ok(())
    }

    /// Replace the config wholesale; callers must re-validate (§4.3 `update`).
    pub fn set_config(&self, config: SessionConfig) {
        *self.config.lock() = config;
    }

    pub fn is_active_process_state(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Ready | SessionState::Active | SessionState::Idle | SessionState::Suspended
        )
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
