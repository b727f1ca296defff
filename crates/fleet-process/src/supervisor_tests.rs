use super::*;
use crate::config::ProcessConfig;
use crate::error::ProcessError;
use fleet_metrics::MetricsRegistry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn supervisor(config: ProcessConfig) -> ProcessSupervisor {
    ProcessSupervisor::new(config, MetricsRegistry::new())
}

#[tokio::test]
async fn start_transitions_to_running_and_assigns_a_pid() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["5".to_string()]));
    sup.start().await.unwrap();
    assert_eq!(sup.status(), ProcessState::Running);
    assert!(sup.pid().is_some());
    sup.kill().await.unwrap();
}

#[tokio::test]
async fn clean_exit_transitions_to_stopped() {
    let sup = supervisor(ProcessConfig::new("true"));
    sup.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), sup.wait())
        .await
        .expect("process should exit promptly");
    assert_eq!(sup.status(), ProcessState::Stopped);
}

#[tokio::test]
async fn nonzero_exit_transitions_to_error() {
    let sup = supervisor(ProcessConfig::new("false"));
    sup.start().await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), sup.wait())
        .await
        .expect("process should exit promptly");
    assert_eq!(sup.status(), ProcessState::Error);
}

#[tokio::test]
async fn stop_sends_sigterm_and_settles_to_stopped() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["30".to_string()]));
    sup.start().await.unwrap();
    sup.stop(Duration::from_secs(2)).await.unwrap();
    assert_eq!(sup.status(), ProcessState::Stopped);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["30".to_string()]));
    sup.start().await.unwrap();
    sup.stop(Duration::from_secs(2)).await.unwrap();
    sup.stop(Duration::from_secs(2)).await.unwrap();
    assert_eq!(sup.status(), ProcessState::Stopped);
}

#[tokio::test]
async fn kill_is_idempotent() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["30".to_string()]));
    sup.start().await.unwrap();
    sup.kill().await.unwrap();
    sup.kill().await.unwrap();
    assert_eq!(sup.status(), ProcessState::Stopped);
}

#[tokio::test]
async fn transition_handler_fires_exactly_once_on_kill() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["30".to_string()]));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    sup.on_transition(Arc::new(move |_from, to| {
        if to == ProcessState::Stopped {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));
    sup.start().await.unwrap();
    sup.kill().await.unwrap();
    sup.kill().await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_config_is_rejected_before_spawn() {
    let sup = supervisor(ProcessConfig::new("   "));
    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::InvalidConfig(_)));
}

#[tokio::test]
async fn double_start_is_rejected() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["5".to_string()]));
    sup.start().await.unwrap();
    let err = sup.start().await.unwrap_err();
    assert!(matches!(err, ProcessError::AlreadyRunning));
    sup.kill().await.unwrap();
}

#[tokio::test]
async fn health_check_reports_ok_while_running() {
    let sup = supervisor(ProcessConfig::new("sleep").args(vec!["5".to_string()]));
    sup.start().await.unwrap();
    assert!(sup.health_check().await.is_ok());
    sup.kill().await.unwrap();
}

#[tokio::test]
async fn exit_info_is_recorded_on_clean_exit() {
    let sup = supervisor(ProcessConfig::new("true"));
    sup.start().await.unwrap();
    sup.wait().await;
    assert_eq!(sup.exit_info().and_then(|info| info.code), Some(0));
}
