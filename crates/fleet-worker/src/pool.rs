// SPDX-License-Identifier: MIT

//! Worker pool (§4.7): queues, dispatcher, workers, and the idle-worker
//! sweeper, composed the way [`fleet_session::SessionManager`] composes its
//! process registry — constructor-injected, never a global.

use crate::dispatcher;
use crate::error::WorkerError;
use crate::queue::TaskQueue;
use crate::task::{Task, TaskResult, TaskWrapper};
use crate::worker::{self, WorkerHandle};
use fleet_core::{CancelScope, Clock, Priority};
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub standard_queue_capacity: usize,
    pub priority_queue_capacity: usize,
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 16,
            standard_queue_capacity: 256,
            priority_queue_capacity: 64,
            idle_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerPoolStats {
    pub workers: usize,
    pub idle_workers: usize,
    pub busy_workers: usize,
    pub queued_standard: usize,
    pub queued_priority: usize,
}

pub struct WorkerPool {
    config: Mutex<WorkerPoolConfig>,
    workers: Mutex<Vec<Arc<WorkerHandle>>>,
    pub(crate) standard_queue: TaskQueue,
    pub(crate) priority_queue: TaskQueue,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    root_ctx: CancelScope,
    pub(crate) shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig, clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Arc<Self> {
        let pool = Arc::new(Self {
            standard_queue: TaskQueue::new(config.standard_queue_capacity),
            priority_queue: TaskQueue::new(config.priority_queue_capacity),
            config: Mutex::new(config),
            workers: Mutex::new(Vec::new()),
            clock,
            metrics,
            root_ctx: CancelScope::root(),
            shutdown: CancellationToken::new(),
        });
        for _ in 0..config.min_workers {
            pool.spawn_worker();
        }
        pool
    }

    /// Submit a task (§4.7 "Submission"). Tasks at `Priority::High` or
    /// above enter the priority queue; the rest enter the standard queue.
    /// `deadline` bounds the task's cancellation scope.
    pub fn submit(
        &self,
        task: Arc<dyn Task>,
        priority: Priority,
        deadline: Option<Duration>,
    ) -> Result<oneshot::Receiver<TaskResult>, WorkerError> {
        let (wrapper, rx) = TaskWrapper::new(task, priority, &self.root_ctx, deadline);
        if priority.is_elevated() {
            self.priority_queue.push(wrapper)?;
        } else {
            self.standard_queue.push(wrapper)?;
        }
        self.metrics.counter("worker_tasks_submitted_total").incr();
        Ok(rx)
    }

    pub(crate) fn find_idle_worker(&self) -> Option<Arc<WorkerHandle>> {
        self.workers.lock().iter().find(|w| w.is_idle()).cloned()
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    pub(crate) fn max_workers(&self) -> usize {
        self.config.lock().max_workers
    }

    pub(crate) fn spawn_worker(&self) -> Arc<WorkerHandle> {
        let handle = worker::spawn(self.clock.clone(), self.metrics.clone());
        self.workers.lock().push(handle.clone());
        self.metrics.gauge("worker_count").add(1);
        handle
    }

    pub fn stats(&self) -> WorkerPoolStats {
        let workers = self.workers.lock();
        let idle = workers.iter().filter(|w| w.is_idle()).count();
        WorkerPoolStats {
            workers: workers.len(),
            idle_workers: idle,
            busy_workers: workers.len() - idle,
            queued_standard: self.standard_queue.len(),
            queued_priority: self.priority_queue.len(),
        }
    }

    /// Remove idle workers past `idle_timeout`, never below `min_workers`
    /// (§4.7 "Autoscaling of workers").
    pub fn sweep_once(&self) {
        let (min_workers, idle_timeout) = {
            let config = self.config.lock();
            (config.min_workers, config.idle_timeout)
        };
        let now = self.clock.epoch_ms();
        let mut workers = self.workers.lock();
        if workers.len() <= min_workers {
            return;
        }

        let removable = workers.len() - min_workers;
        let mut removed = 0;
        workers.retain(|w| {
            if removed >= removable {
                return true;
            }
            let idle_ms = now.saturating_sub(w.last_task_at_ms());
            if w.is_idle() && idle_ms > idle_timeout.as_millis() as u64 {
                w.stop();
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            info!(removed, "worker pool sweeper removed idle workers");
            self.metrics.gauge("worker_count").add(-(removed as i64));
            self.metrics.counter("worker_sweep_evictions_total").add(removed as u64);
        }
    }

    pub fn set_max_workers(&self, max: usize) {
        self.config.lock().max_workers = max;
    }

    pub fn spawn_dispatcher(self: &Arc<Self>) {
        tokio::spawn(dispatcher::run(self.clone()));
    }

    pub fn spawn_sweeper(self: &Arc<Self>) {
        let pool = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let interval = pool.config.lock().sweep_interval;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => pool.sweep_once(),
                    _ = shutdown.cancelled() => return,
                }
            }
        });
    }

    /// Stop the dispatcher/sweeper loops and every worker.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.root_ctx.cancel();
        for worker in self.workers.lock().iter() {
            worker.stop();
        }
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
