use super::*;
use fleet_core::SystemClock;
use fleet_process::ProcessConfig;
use fleet_session::{InMemoryProcessRegistry, InMemorySessionStore, SessionConfig};

fn new_pool(config: PoolConfig) -> Arc<SessionPool> {
    let manager = SessionManager::new(
        Arc::new(InMemorySessionStore::new()),
        InMemoryProcessRegistry::new(),
        MetricsRegistry::new(),
        Arc::new(SystemClock),
    );
    SessionPool::new(manager, MetricsRegistry::new(), Arc::new(SystemClock), config)
}

fn long_running() -> ProcessConfig {
    ProcessConfig::new("sleep").args(vec!["5".to_string()])
}

#[tokio::test]
async fn acquire_creates_a_new_session_when_pool_is_empty() {
    let pool = new_pool(PoolConfig::default());
    let pooled =
        pool.acquire("ws", "user", &SessionConfig::new(), long_running()).await.unwrap();
    assert!(pooled.is_in_use());
    assert_eq!(pool.stats(), PoolStats { total: 1, active: 1, idle: 0 });
}

#[tokio::test]
async fn release_then_acquire_reuses_the_same_session() {
    let pool = new_pool(PoolConfig::default());
    let config = SessionConfig::new();
    let pooled = pool.acquire("ws", "user", &config, long_running()).await.unwrap();
    let id = pooled.session_id;
    pool.release(id).unwrap();
    assert_eq!(pool.stats(), PoolStats { total: 1, active: 0, idle: 1 });

    let reused = pool.acquire("ws", "user", &config, long_running()).await.unwrap();
    assert_eq!(reused.session_id, id);
    assert_eq!(reused.use_count(), 2);
}

#[tokio::test]
async fn acquire_fails_with_pool_full_when_at_capacity() {
    let pool = new_pool(PoolConfig { max: 1, ..PoolConfig::default() });
    pool.acquire("ws", "user", &SessionConfig::new(), long_running()).await.unwrap();
    let err = pool
        .acquire("ws", "user", &SessionConfig::new().temperature(0.5), long_running())
        .await
        .unwrap_err();
    assert!(matches!(err, PoolError::PoolFull));
}

#[tokio::test]
async fn release_unknown_id_is_an_explicit_error() {
    let pool = new_pool(PoolConfig::default());
    let err = pool.release(fleet_core::SessionId::new()).unwrap_err();
    assert!(matches!(err, PoolError::NotFound(_)));
}

#[tokio::test]
async fn sweep_evicts_idle_sessions_past_max_idle() {
    let pool = new_pool(PoolConfig {
        max_idle: Duration::from_millis(0),
        max_lifetime: Duration::from_secs(3600),
        ..PoolConfig::default()
    });
    let pooled =
        pool.acquire("ws", "user", &SessionConfig::new(), long_running()).await.unwrap();
    let id = pooled.session_id;
    pool.release(id).unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    pool.sweep_once().await;
    assert_eq!(pool.stats().total, 0);
}
