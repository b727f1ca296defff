use super::*;
use crate::registry::InMemoryProcessRegistry;
use crate::store::InMemorySessionStore;
use fleet_core::SystemClock;
use fleet_metrics::MetricsRegistry;
use fleet_process::ProcessConfig;

fn new_manager() -> Arc<SessionManager> {
    SessionManager::new(
        Arc::new(InMemorySessionStore::new()),
        InMemoryProcessRegistry::new(),
        MetricsRegistry::new(),
        Arc::new(SystemClock),
    )
}

fn long_running_process() -> ProcessConfig {
    ProcessConfig::new("sleep").args(vec!["5".to_string()])
}

#[tokio::test]
async fn create_provisions_a_process_and_reaches_ready() {
    let manager = new_manager();
    let session = manager
        .create("ws-1", "user-1", SessionConfig::new(), long_running_process())
        .await
        .unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.process_id().is_some());
    manager.close(session.id).await.unwrap();
}

#[tokio::test]
async fn create_rolls_back_on_provisioning_failure() {
    let manager = new_manager();
    let result =
        manager.create("ws-1", "user-1", SessionConfig::new(), ProcessConfig::new("   ")).await;
    assert!(result.is_err());
    assert_eq!(manager.query(&SessionFilter::default()).len(), 0);
}

#[tokio::test]
async fn create_rejects_invalid_session_config() {
    let manager = new_manager();
    let bad_config = SessionConfig::new().max_turns(0);
    let result = manager.create("ws-1", "user-1", bad_config, long_running_process()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn close_is_idempotent() {
    let manager = new_manager();
    let session = manager
        .create("ws-1", "user-1", SessionConfig::new(), long_running_process())
        .await
        .unwrap();
    manager.close(session.id).await.unwrap();
    manager.close(session.id).await.unwrap();
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn query_filters_by_workspace_and_state() {
    let manager = new_manager();
    let a = manager
        .create("ws-a", "user-1", SessionConfig::new(), long_running_process())
        .await
        .unwrap();
    let _b = manager
        .create("ws-b", "user-1", SessionConfig::new(), long_running_process())
        .await
        .unwrap();

    let found = manager.query(&SessionFilter {
        workspace_id: Some("ws-a".to_string()),
        ..Default::default()
    });
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, a.id);

    manager.close(a.id).await.unwrap();
    let ready = manager.query(&SessionFilter { state: Some(SessionState::Ready), ..Default::default() });
    assert_eq!(ready.len(), 1);
}

#[tokio::test]
async fn update_config_rejects_invalid_transform() {
    let manager = new_manager();
    let session = manager
        .create("ws-1", "user-1", SessionConfig::new(), long_running_process())
        .await
        .unwrap();
    let result = manager.update_config(session.id, |config| config.temperature = 9.0).await;
    assert!(result.is_err());
    manager.close(session.id).await.unwrap();
}
