use super::*;
use crate::config::SessionConfig;

fn new_session() -> Session {
    Session::new("ws-1", "user-1", SessionConfig::new(), 1_000)
}

#[test]
fn new_session_starts_in_created_state() {
    let session = new_session();
    assert_eq!(session.state(), SessionState::Created);
    assert!(session.process_id().is_none());
}

#[test]
fn transition_follows_adjacency() {
    let session = new_session();
    session.transition(SessionState::Initializing).unwrap();
    session.transition(SessionState::Ready).unwrap();
    assert_eq!(session.state(), SessionState::Ready);
}

#[test]
fn invalid_transition_is_rejected_and_state_unchanged() {
    let session = new_session();
    let err = session.transition(SessionState::Active).unwrap_err();
    assert!(matches!(err, SessionError::InvalidTransition { .. }));
    assert_eq!(session.state(), SessionState::Created);
}

#[test]
fn touch_updates_last_active() {
    let session = new_session();
    assert_eq!(session.last_active_ms(), 1_000);
    session.touch(2_000);
    assert_eq!(session.last_active_ms(), 2_000);
}

#[test]
fn metadata_round_trips() {
    let session = new_session();
    session.set_metadata("k", Value::String("v".to_string()));
    assert_eq!(session.metadata().get("k"), Some(&Value::String("v".to_string())));
}

#[test]
fn process_id_can_be_attached_and_cleared() {
    let session = new_session();
    let pid = ProcessId::new();
    session.set_process_id(Some(pid));
    assert_eq!(session.process_id(), Some(pid));
    session.set_process_id(None);
    assert!(session.process_id().is_none());
}
