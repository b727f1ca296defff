// SPDX-License-Identifier: MIT

//! Submitted work (§3 Task/TaskWrapper, §4.7).

use crate::error::WorkerError;
use async_trait::async_trait;
use fleet_core::{CancelScope, Priority, TaskId};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Opaque task output, downcast by the caller that knows the concrete type
/// it submitted.
pub type TaskOutput = Box<dyn Any + Send>;

/// Unit of work submitted to the pool. Implementations do their own
/// cancellation checks against `ctx` during long-running work; the wrapper
/// only guarantees `ctx` is cancelled once on deadline expiry or on
/// completion.
#[async_trait]
pub trait Task: Send + Sync {
    async fn execute(&self, ctx: CancelScope) -> Result<TaskOutput, WorkerError>;
}

/// Outcome of a completed (or cancelled/panicked) task (§4.7 worker loop
/// step 3: "success/err/duration/start/end").
#[derive(Debug)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub outcome: Result<TaskOutput, WorkerError>,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub duration: Duration,
}

/// A queued task plus its per-task deadline-bound cancellation scope and
/// one-shot result channel (§3 TaskWrapper).
pub struct TaskWrapper {
    pub id: TaskId,
    pub priority: Priority,
    pub(crate) task: Arc<dyn Task>,
    pub(crate) ctx: CancelScope,
    pub(crate) result_tx: Mutex<Option<oneshot::Sender<TaskResult>>>,
}

impl TaskWrapper {
    pub fn new(
        task: Arc<dyn Task>,
        priority: Priority,
        parent: &CancelScope,
        deadline: Option<Duration>,
    ) -> (Arc<Self>, oneshot::Receiver<TaskResult>) {
        let ctx = match deadline {
            Some(d) => parent.child_with_deadline(d),
            None => parent.child(),
        };
        let (result_tx, result_rx) = oneshot::channel();
        let wrapper = Arc::new(Self {
            id: TaskId::new(),
            priority,
            task,
            ctx,
            result_tx: Mutex::new(Some(result_tx)),
        });
        (wrapper, result_rx)
    }

    /// Deliver the result, dropping it silently if nobody is listening
    /// (§4.7 "drop if no receiver").
    pub(crate) fn deliver(&self, result: TaskResult) {
        if let Some(tx) = self.result_tx.lock().take() {
            let _ = tx.send(result);
        }
    }
}
