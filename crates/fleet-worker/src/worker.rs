// SPDX-License-Identifier: MIT

//! A single worker loop (§4.7 "Worker loop").

use crate::error::WorkerError;
use crate::task::{TaskResult, TaskWrapper};
use fleet_core::{Clock, TaskId, WorkerId};
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Busy,
}

/// A spawned worker: owns a single-slot inbound channel (§4.7 "single-slot
/// inbound") and a quit token. Worker identity and bookkeeping outlive the
/// loop task so the dispatcher/sweeper can inspect it without joining.
pub struct WorkerHandle {
    pub id: WorkerId,
    state: Mutex<WorkerState>,
    last_task_at_ms: AtomicU64,
    current_task: Mutex<Option<TaskId>>,
    inbound: mpsc::Sender<Arc<TaskWrapper>>,
    pub(crate) quit: CancellationToken,
}

impl WorkerHandle {
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.state() == WorkerState::Idle
    }

    pub fn last_task_at_ms(&self) -> u64 {
        self.last_task_at_ms.load(Ordering::Relaxed)
    }

    pub fn current_task(&self) -> Option<TaskId> {
        *self.current_task.lock()
    }

    /// Hand a task to this worker's single slot. `Err` means the worker has
    /// already exited or its slot is occupied; the caller should treat the
    /// worker as unavailable and pick another.
    pub(crate) fn try_assign(&self, wrapper: Arc<TaskWrapper>) -> Result<(), Arc<TaskWrapper>> {
        self.inbound.try_send(wrapper).map_err(|e| match e {
            mpsc::error::TrySendError::Full(w) => w,
            mpsc::error::TrySendError::Closed(w) => w,
        })
    }

    pub fn stop(&self) {
        self.quit.cancel();
    }
}

/// Spawn a worker loop and return its handle (§4.7 "Worker loop" steps 1-3).
pub fn spawn(clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Arc<WorkerHandle> {
    let (inbound_tx, inbound_rx) = mpsc::channel(1);
    let handle = Arc::new(WorkerHandle {
        id: WorkerId::new(),
        state: Mutex::new(WorkerState::Idle),
        last_task_at_ms: AtomicU64::new(clock.epoch_ms()),
        current_task: Mutex::new(None),
        inbound: inbound_tx,
        quit: CancellationToken::new(),
    });
    tokio::spawn(run_loop(handle.clone(), inbound_rx, clock, metrics));
    handle
}

async fn run_loop(
    handle: Arc<WorkerHandle>,
    mut inbound: mpsc::Receiver<Arc<TaskWrapper>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
) {
    loop {
        *handle.state.lock() = WorkerState::Idle;
        handle.last_task_at_ms.store(clock.epoch_ms(), Ordering::Relaxed);

        let wrapper = tokio::select! {
            _ = handle.quit.cancelled() => return,
            maybe = inbound.recv() => match maybe {
                Some(w) => w,
                None => return,
            },
        };

        *handle.state.lock() = WorkerState::Busy;
        *handle.current_task.lock() = Some(wrapper.id);
        metrics.gauge("worker_busy_count").add(1);

        let started_at_ms = clock.epoch_ms();
        let task = wrapper.task.clone();
        let ctx = wrapper.ctx.clone();
        let exec = tokio::spawn(async move { task.execute(ctx).await });

        let outcome = tokio::select! {
            _ = wrapper.ctx.cancelled() => Err(WorkerError::Cancelled),
            joined = exec => match joined {
                Ok(result) => result,
                Err(join_err) => {
                    metrics.counter("worker_task_panics_total").incr();
                    error!(task_id = %wrapper.id, error = %join_err, "task panicked");
                    Err(WorkerError::Panicked(join_err.to_string()))
                }
            },
        };
        if outcome.is_err() {
            metrics.counter("worker_task_failures_total").incr();
        }

        let ended_at_ms = clock.epoch_ms();
        wrapper.deliver(TaskResult {
            task_id: wrapper.id,
            outcome,
            started_at_ms,
            ended_at_ms,
            duration: std::time::Duration::from_millis(ended_at_ms.saturating_sub(started_at_ms)),
        });
        wrapper.ctx.cancel();

        metrics.gauge("worker_busy_count").add(-1);
        *handle.current_task.lock() = None;
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
