// SPDX-License-Identifier: MIT

//! Recovery orchestrator (§4.9.4): a priority-ordered strategy registry per
//! error target, run with its own deadline and cancellation, recorded into
//! a bounded history.

use crate::classifier::ErrorClass;
use crate::error::ResilienceError;
use async_trait::async_trait;
use fleet_core::{CancelScope, Clock, RecoveryExecutionId};
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const HISTORY_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryTarget {
    Process,
    Session,
    Resource,
    Network,
}

/// One remediation a [`RecoveryOrchestrator`] can run against a target
/// (§4.9.4 "name, can_recover, execute, estimated time, success rate").
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;
    fn priority(&self) -> i32;
    fn can_recover(&self, class: &ErrorClass) -> bool;
    async fn execute(&self, target_id: &str) -> Result<(), ResilienceError>;
    fn estimated_time(&self) -> Duration;
    fn success_rate(&self) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStatus {
    Running,
    Succeeded,
    Failed(String),
    TimedOut,
}

/// Live state of an in-flight recovery: step journal plus status, both
/// queryable while the recovery runs (§4.9.4 "step journal, running
/// status").
pub struct RecoveryExecution {
    pub id: RecoveryExecutionId,
    pub strategy_name: String,
    pub target_id: String,
    pub deadline_ms: u64,
    steps: Mutex<Vec<String>>,
    status: Mutex<RecoveryStatus>,
}

impl RecoveryExecution {
    pub fn steps(&self) -> Vec<String> {
        self.steps.lock().clone()
    }

    pub fn status(&self) -> RecoveryStatus {
        self.status.lock().clone()
    }

    fn push_step(&self, step: impl Into<String>) {
        self.steps.lock().push(step.into());
    }
}

/// A completed recovery, kept in the orchestrator's bounded history.
#[derive(Debug, Clone)]
pub struct RecoveryRecord {
    pub id: RecoveryExecutionId,
    pub strategy_name: String,
    pub target_id: String,
    pub target: RecoveryTarget,
    pub status: RecoveryStatus,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryOrchestratorConfig {
    pub max_concurrent: usize,
    pub default_timeout: Duration,
}

impl Default for RecoveryOrchestratorConfig {
    fn default() -> Self {
        Self { max_concurrent: 4, default_timeout: Duration::from_secs(60) }
    }
}

pub struct RecoveryOrchestrator {
    config: RecoveryOrchestratorConfig,
    strategies: Mutex<HashMap<RecoveryTarget, Vec<Arc<dyn RecoveryStrategy>>>>,
    universal: Mutex<Option<Arc<dyn RecoveryStrategy>>>,
    running: Mutex<HashMap<RecoveryExecutionId, Arc<RecoveryExecution>>>,
    history: Mutex<VecDeque<RecoveryRecord>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    root_ctx: CancelScope,
}

impl RecoveryOrchestrator {
    pub fn new(config: RecoveryOrchestratorConfig, clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Arc<Self> {
        Arc::new(Self {
            config,
            strategies: Mutex::new(HashMap::new()),
            universal: Mutex::new(None),
            running: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            clock,
            metrics,
            root_ctx: CancelScope::root(),
        })
    }

    /// Register a strategy for `target`, kept sorted by descending priority
    /// so [`Self::recover_from_error`] tries the highest-priority match
    /// first (§4.9.4).
    pub fn register_strategy(&self, target: RecoveryTarget, strategy: Arc<dyn RecoveryStrategy>) {
        let mut strategies = self.strategies.lock();
        let list = strategies.entry(target).or_default();
        list.push(strategy);
        list.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Register the fallback strategy used when no target-specific
    /// strategy's `can_recover` matches.
    pub fn register_universal(&self, strategy: Arc<dyn RecoveryStrategy>) {
        *self.universal.lock() = Some(strategy);
    }

    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    pub fn history(&self) -> Vec<RecoveryRecord> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn execution_status(&self, id: RecoveryExecutionId) -> Option<RecoveryStatus> {
        self.running.lock().get(&id).map(|e| e.status())
    }

    pub fn execution_steps(&self, id: RecoveryExecutionId) -> Option<Vec<String>> {
        self.running.lock().get(&id).map(|e| e.steps())
    }

    fn pick_strategy(&self, target: RecoveryTarget, class: &ErrorClass) -> Option<Arc<dyn RecoveryStrategy>> {
        let strategies = self.strategies.lock();
        if let Some(list) = strategies.get(&target) {
            if let Some(found) = list.iter().find(|s| s.can_recover(class)) {
                return Some(found.clone());
            }
        }
        self.universal.lock().clone()
    }

    /// Start a recovery for `target_id` (§4.9.4). Refuses when
    /// `max_concurrent` recoveries are already running; otherwise picks a
    /// strategy, spawns it with its own deadline-bound cancellation, and
    /// returns the execution id immediately — the recovery itself runs
    /// asynchronously and lands in [`Self::history`] on completion.
    pub fn recover_from_error(
        self: &Arc<Self>,
        target: RecoveryTarget,
        target_id: impl Into<String>,
        class: &ErrorClass,
    ) -> Result<RecoveryExecutionId, ResilienceError> {
        if self.running.lock().len() >= self.config.max_concurrent {
            return Err(ResilienceError::RecoveryCapacityExceeded);
        }
        let strategy = self.pick_strategy(target, class).ok_or(ResilienceError::NoStrategyAvailable)?;

        let id = RecoveryExecutionId::new();
        let target_id = target_id.into();
        let deadline_ms = self.clock.epoch_ms() + self.config.default_timeout.as_millis() as u64;
        let execution = Arc::new(RecoveryExecution {
            id,
            strategy_name: strategy.name().to_string(),
            target_id,
            deadline_ms,
            steps: Mutex::new(Vec::new()),
            status: Mutex::new(RecoveryStatus::Running),
        });
        self.running.lock().insert(id, execution.clone());
        self.metrics.counter("recovery_started_total").incr();

        let cancel = self.root_ctx.child_with_deadline(self.config.default_timeout);
        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_execution(execution, strategy, cancel, target).await;
        });

        Ok(id)
    }

    async fn run_execution(
        &self,
        execution: Arc<RecoveryExecution>,
        strategy: Arc<dyn RecoveryStrategy>,
        cancel: CancelScope,
        target: RecoveryTarget,
    ) {
        let started_at_ms = self.clock.epoch_ms();
        execution.push_step(format!("running strategy {}", strategy.name()));

        let target_id = execution.target_id.clone();
        let inner = tokio::spawn(async move { strategy.execute(&target_id).await });
        let status = tokio::select! {
            joined = inner => match joined {
                Ok(Ok(())) => RecoveryStatus::Succeeded,
                Ok(Err(err)) => RecoveryStatus::Failed(err.to_string()),
                Err(join_err) => RecoveryStatus::Failed(format!("strategy panicked: {join_err}")),
            },
            _ = cancel.cancelled() => RecoveryStatus::TimedOut,
        };

        if matches!(status, RecoveryStatus::TimedOut) {
            warn!(execution_id = %execution.id, strategy = %execution.strategy_name, "recovery execution timed out");
        }
        execution.push_step(format!("finished: {status:?}"));
        *execution.status.lock() = status.clone();

        self.metrics.counter("recovery_executions_total").incr();
        if matches!(status, RecoveryStatus::Succeeded) {
            self.metrics.counter("recovery_successes_total").incr();
        } else {
            self.metrics.counter("recovery_failures_total").incr();
        }

        let record = RecoveryRecord {
            id: execution.id,
            strategy_name: execution.strategy_name.clone(),
            target_id: execution.target_id.clone(),
            target,
            status,
            started_at_ms,
            ended_at_ms: self.clock.epoch_ms(),
        };
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(record);
        drop(history);

        self.running.lock().remove(&execution.id);
    }
}

/// A [`RecoveryStrategy`] built from a name/target match predicate/async
/// callback, so built-in strategies don't need a bespoke struct each
/// (§4.9.4 built-ins: restart process, recreate session, resource cleanup,
/// network reset all share this shape).
struct CallbackStrategy<F> {
    name: String,
    priority: i32,
    estimated_time: Duration,
    success_rate: f64,
    matcher: Arc<dyn Fn(&ErrorClass) -> bool + Send + Sync>,
    action: F,
}

#[async_trait]
impl<F, Fut> RecoveryStrategy for CallbackStrategy<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResilienceError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_recover(&self, class: &ErrorClass) -> bool {
        (self.matcher)(class)
    }

    async fn execute(&self, target_id: &str) -> Result<(), ResilienceError> {
        (self.action)(target_id.to_string()).await
    }

    fn estimated_time(&self) -> Duration {
        self.estimated_time
    }

    fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

/// Restart the supervised process (§4.9.4 "restart process, targets=process").
pub fn restart_process_strategy<F, Fut>(action: F) -> Arc<dyn RecoveryStrategy>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResilienceError>> + Send + 'static,
{
    use fleet_core::ErrorKind;
    Arc::new(CallbackStrategy {
        name: "restart_process".to_string(),
        priority: 100,
        estimated_time: Duration::from_secs(5),
        success_rate: 0.8,
        matcher: Arc::new(|class: &ErrorClass| matches!(class.kind, ErrorKind::Process | ErrorKind::Timeout)),
        action,
    })
}

/// Tear down and recreate the session (§4.9.4 "recreate session, targets=session").
pub fn recreate_session_strategy<F, Fut>(action: F) -> Arc<dyn RecoveryStrategy>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResilienceError>> + Send + 'static,
{
    use fleet_core::ErrorKind;
    Arc::new(CallbackStrategy {
        name: "recreate_session".to_string(),
        priority: 80,
        estimated_time: Duration::from_secs(10),
        success_rate: 0.7,
        matcher: Arc::new(|class: &ErrorClass| matches!(class.kind, ErrorKind::Process | ErrorKind::Internal)),
        action,
    })
}

/// Garbage-collect and sweep idle resources (§4.9.4 "resource cleanup, GC +
/// idle sweep").
pub fn resource_cleanup_strategy<F, Fut>(action: F) -> Arc<dyn RecoveryStrategy>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResilienceError>> + Send + 'static,
{
    use fleet_core::ErrorKind;
    Arc::new(CallbackStrategy {
        name: "resource_cleanup".to_string(),
        priority: 90,
        estimated_time: Duration::from_secs(3),
        success_rate: 0.9,
        matcher: Arc::new(|class: &ErrorClass| matches!(class.kind, ErrorKind::Resource)),
        action,
    })
}

/// Reconnect and refresh tokens (§4.9.4 "network reset, reconnect + refresh
/// tokens").
pub fn network_reset_strategy<F, Fut>(action: F) -> Arc<dyn RecoveryStrategy>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ResilienceError>> + Send + 'static,
{
    use fleet_core::ErrorKind;
    Arc::new(CallbackStrategy {
        name: "network_reset".to_string(),
        priority: 85,
        estimated_time: Duration::from_secs(5),
        success_rate: 0.75,
        matcher: Arc::new(|class: &ErrorClass| matches!(class.kind, ErrorKind::Network | ErrorKind::Auth)),
        action,
    })
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
