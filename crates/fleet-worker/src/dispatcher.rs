// SPDX-License-Identifier: MIT

//! The dispatcher loop (§4.7 "Dispatcher (single logical loop)").

use crate::pool::WorkerPool;
use crate::task::TaskWrapper;
use std::sync::Arc;
use std::time::Duration;

/// Backoff used when every worker is busy and the pool is already at its
/// configured maximum, to avoid a tight retry spin.
const RETRY_BACKOFF: Duration = Duration::from_millis(5);

pub(crate) async fn run(pool: Arc<WorkerPool>) {
    loop {
        let task = {
            let priority = pool.priority_queue.pop();
            if priority.is_some() {
                priority
            } else {
                pool.standard_queue.pop()
            }
        };

        let Some(task) = task else {
            tokio::select! {
                _ = pool.priority_queue.notified() => {}
                _ = pool.standard_queue.notified() => {}
                _ = pool.shutdown.cancelled() => return,
            }
            continue;
        };

        if pool.shutdown.is_cancelled() {
            return;
        }

        dispatch_one(&pool, task).await;
    }
}

async fn dispatch_one(pool: &Arc<WorkerPool>, task: Arc<TaskWrapper>) {
    let task = if let Some(worker) = pool.find_idle_worker() {
        match worker.try_assign(task) {
            Ok(()) => return,
            Err(task) => task,
        }
    } else {
        task
    };

    let task = if pool.worker_count() < pool.max_workers() {
        let worker = pool.spawn_worker();
        match worker.try_assign(task) {
            Ok(()) => return,
            Err(task) => task,
        }
    } else {
        task
    };

    // No idle worker and at capacity: re-enqueue and let the dispatcher
    // retry on the next wakeup (§4.7 "re-enqueues the task").
    requeue(pool, task).await;
}

async fn requeue(pool: &Arc<WorkerPool>, task: Arc<TaskWrapper>) {
    if task.priority.is_elevated() {
        pool.priority_queue.push_front(task);
    } else {
        pool.standard_queue.push_front(task);
    }
    tokio::time::sleep(RETRY_BACKOFF).await;
}
