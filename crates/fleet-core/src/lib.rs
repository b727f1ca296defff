// SPDX-License-Identifier: MIT

//! Shared identifiers, error taxonomy, clock, cancellation, and envelope
//! types used by every crate in the fleet runtime.

pub mod cancel;
pub mod clock;
pub mod envelope;
pub mod error;
pub mod id;
#[macro_use]
mod macros;
pub mod priority;
pub mod resource;

pub use cancel::CancelScope;
pub use clock::{Clock, FakeClock, SystemClock};
pub use envelope::{Envelope, EnvelopeError, Tag};
pub use error::{ConfigError, ErrorKind, FleetError, Severity};
pub use priority::Priority;
pub use resource::ResourceCaps;

crate::define_id! {
    /// Identifies a supervised child process (§3 Process, §4.1).
    pub struct ProcessId("prc-");
}

crate::define_id! {
    /// Identifies a worker in the worker pool (§3 Worker, §4.7).
    pub struct WorkerId("wkr-");
}

crate::define_id! {
    /// Identifies a submitted task (§3 Task/TaskWrapper, §4.7).
    pub struct TaskId("tsk-");
}

crate::define_id! {
    /// Identifies an event bus subscription handle (§4.8.5).
    pub struct SubscriptionId("sub-");
}

crate::define_id! {
    /// Identifies a recovery execution (§4.9.4).
    pub struct RecoveryExecutionId("rcv-");
}

/// Identifies a logical session (§3 Session). The data model calls this out
/// explicitly as a UUID, unlike the nanoid-backed ids above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn from_uuid(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod session_id_tests {
    use super::*;

    #[test]
    fn distinct_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn round_trips_through_json() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
