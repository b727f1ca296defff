// SPDX-License-Identifier: MIT

//! Session state machine (§4.2).

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Initializing,
    Ready,
    Active,
    Idle,
    Suspended,
    Closing,
    Closed,
    Error,
}

fleet_core::simple_display! {
    SessionState {
        Created => "created",
        Initializing => "initializing",
        Ready => "ready",
        Active => "active",
        Idle => "idle",
        Suspended => "suspended",
        Closing => "closing",
        Closed => "closed",
        Error => "error",
    }
}

impl SessionState {
    pub const ALL: [SessionState; 9] = [
        SessionState::Created,
        SessionState::Initializing,
        SessionState::Ready,
        SessionState::Active,
        SessionState::Idle,
        SessionState::Suspended,
        SessionState::Closing,
        SessionState::Closed,
        SessionState::Error,
    ];

    /// Outbound edges for this state (§4.2 adjacency).
    pub fn successors(self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Created => &[Initializing, Error, Closed],
            Initializing => &[Ready, Error, Closed],
            Ready => &[Active, Idle, Suspended, Closing, Error],
            Active => &[Idle, Suspended, Closing, Error],
            Idle => &[Active, Suspended, Closing, Error],
            Suspended => &[Ready, Closing, Error],
            Closing => &[Closed, Error],
            Closed => &[],
            Error => &[Closing, Closed],
        }
    }

    pub fn can_transition_to(self, to: SessionState) -> bool {
        self.successors().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// BFS shortest path over the adjacency, used to plan recovery. `None`
    /// if `to` is unreachable from `from`.
    pub fn shortest_path(from: SessionState, to: SessionState) -> Option<Vec<SessionState>> {
        if from == to {
            return Some(vec![from]);
        }
        let mut queue = VecDeque::new();
        let mut came_from: std::collections::HashMap<SessionState, SessionState> =
            std::collections::HashMap::new();
        queue.push_back(from);
        let mut visited = std::collections::HashSet::new();
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for &next in current.successors() {
                if visited.insert(next) {
                    came_from.insert(next, current);
                    if next == to {
                        let mut path = vec![to];
                        let mut cursor = to;
                        while let Some(&prev) = came_from.get(&cursor) {
                            path.push(prev);
                            cursor = prev;
                        }
                        path.reverse();
                        return Some(path);
                    }
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
