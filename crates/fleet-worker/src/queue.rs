// SPDX-License-Identifier: MIT

//! Bounded task queues (§4.7: "a standard queue and a priority queue;
//! overflow returns queue full without blocking").

use crate::error::WorkerError;
use crate::task::TaskWrapper;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

pub struct TaskQueue {
    capacity: usize,
    items: Mutex<VecDeque<Arc<TaskWrapper>>>,
    notify: Notify,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: Mutex::new(VecDeque::new()), notify: Notify::new() }
    }

    pub fn push(&self, task: Arc<TaskWrapper>) -> Result<(), WorkerError> {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            return Err(WorkerError::QueueFull);
        }
        items.push_back(task);
        drop(items);
        self.notify.notify_one();
        Ok(())
    }

    /// Re-enqueue at the front, preserving retry order ahead of fresh
    /// submissions (§4.7 dispatcher "re-enqueues the task").
    pub fn push_front(&self, task: Arc<TaskWrapper>) {
        self.items.lock().push_front(task);
        self.notify.notify_one();
    }

    pub fn pop(&self) -> Option<Arc<TaskWrapper>> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
