// SPDX-License-Identifier: MIT

//! Process state machine (§4.1).
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`, with `Error`
//! reachable from any state and able to settle back into `Stopping`/`Stopped`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

fleet_core::simple_display! {
    ProcessState {
        Created => "created",
        Starting => "starting",
        Running => "running",
        Stopping => "stopping",
        Stopped => "stopped",
        Error => "error",
    }
}

impl ProcessState {
    /// Whether `to` is a valid transition from `self` (§4.1 state machine).
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        match self {
            Created => matches!(to, Starting | Error),
            Starting => matches!(to, Running | Error),
            Running => matches!(to, Stopping | Error),
            Stopping => matches!(to, Stopped | Error),
            Stopped => false,
            Error => matches!(to, Stopping | Stopped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_allowed() {
        assert!(ProcessState::Created.can_transition_to(ProcessState::Starting));
        assert!(ProcessState::Starting.can_transition_to(ProcessState::Running));
        assert!(ProcessState::Running.can_transition_to(ProcessState::Stopping));
        assert!(ProcessState::Stopping.can_transition_to(ProcessState::Stopped));
    }

    #[test]
    fn error_reachable_from_any_state() {
        for state in [
            ProcessState::Created,
            ProcessState::Starting,
            ProcessState::Running,
            ProcessState::Stopping,
        ] {
            assert!(state.can_transition_to(ProcessState::Error));
        }
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(!ProcessState::Stopped.can_transition_to(ProcessState::Starting));
        assert!(!ProcessState::Stopped.can_transition_to(ProcessState::Running));
    }

    #[test]
    fn error_can_settle_to_stopping_or_stopped() {
        assert!(ProcessState::Error.can_transition_to(ProcessState::Stopping));
        assert!(ProcessState::Error.can_transition_to(ProcessState::Stopped));
        assert!(!ProcessState::Error.can_transition_to(ProcessState::Running));
    }

    #[test]
    fn running_to_created_is_invalid() {
        assert!(!ProcessState::Running.can_transition_to(ProcessState::Created));
    }
}
