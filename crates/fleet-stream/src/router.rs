// SPDX-License-Identifier: MIT

//! Message router (§4.8.4): per-tag ordered handler fan-out with a
//! synchronous and an asynchronous delivery mode.

use crate::error::StreamError;
use async_trait::async_trait;
use fleet_core::{Envelope, Priority, Tag};
use fleet_metrics::MetricsRegistry;
use fleet_worker::{Task, TaskOutput, WorkerPool};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const HANDLER_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, envelope: &Envelope) -> Result<(), StreamError>;
}

pub type ErrorCallback = Arc<dyn Fn(Tag, &StreamError) + Send + Sync>;

struct Registered {
    priority: i32,
    handler: Arc<dyn Handler>,
}

/// For each tag, an ordered-by-descending-priority handler list plus a
/// default fallback handler used when a tag has no registrants.
pub struct MessageRouter {
    handlers: Mutex<HashMap<Tag, Vec<Registered>>>,
    fallback: Mutex<Option<Arc<dyn Handler>>>,
    error_callback: Mutex<Option<ErrorCallback>>,
    metrics: Arc<MetricsRegistry>,
    async_pool: Option<Arc<WorkerPool>>,
}

impl MessageRouter {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { handlers: Mutex::new(HashMap::new()), fallback: Mutex::new(None), error_callback: Mutex::new(None), metrics, async_pool: None }
    }

    /// Enable [`Self::route_async`] by giving the router a worker pool to
    /// enqueue deliveries onto; the pool's `max_workers` is the
    /// `max_concurrency` limit (§4.8.4 "enqueued onto the worker pool with
    /// max_concurrency limit").
    pub fn with_async_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.async_pool = Some(pool);
        self
    }

    pub fn register(&self, tag: Tag, priority: i32, handler: Arc<dyn Handler>) {
        let mut handlers = self.handlers.lock();
        let list = handlers.entry(tag).or_default();
        list.push(Registered { priority, handler });
        list.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn set_fallback(&self, handler: Arc<dyn Handler>) {
        *self.fallback.lock() = Some(handler);
    }

    pub fn on_error(&self, callback: ErrorCallback) {
        *self.error_callback.lock() = Some(callback);
    }

    fn handlers_for(&self, tag: Tag) -> Vec<Arc<dyn Handler>> {
        let handlers = self.handlers.lock();
        match handlers.get(&tag) {
            Some(list) if !list.is_empty() => list.iter().map(|r| r.handler.clone()).collect(),
            _ => self.fallback.lock().iter().cloned().collect(),
        }
    }

    /// Fan out to every handler for the envelope's tag; a handler failing
    /// does not stop the others, but the overall call returns the first
    /// error encountered (§4.8.4 Synchronous mode).
    pub async fn route_sync(&self, envelope: Envelope) -> Result<(), StreamError> {
        let tag = envelope.tag;
        let handlers = self.handlers_for(tag);
        self.metrics.counter("router_routed_total").incr();
        self.metrics.counter(&format!("router_routed_total:{tag}")).incr();

        let mut first_err = None;
        for handler in handlers {
            if let Err(err) = invoke(handler, envelope.clone()).await {
                self.metrics.counter("router_errors_total").incr();
                self.metrics.counter(&format!("router_errors_total:{tag}")).incr();
                if let Some(cb) = self.error_callback.lock().clone() {
                    cb(tag, &err);
                }
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Enqueue each delivery onto the worker pool and return immediately
    /// (§4.8.4 Asynchronous mode).
    pub fn route_async(&self, envelope: Envelope) {
        let Some(pool) = &self.async_pool else { return };
        let tag = envelope.tag;
        self.metrics.counter("router_routed_total").incr();
        self.metrics.counter(&format!("router_routed_total:{tag}")).incr();

        for handler in self.handlers_for(tag) {
            let task: Arc<dyn Task> =
                Arc::new(DeliveryTask { handler, envelope: envelope.clone() });
            let metrics = self.metrics.clone();
            let error_callback = self.error_callback.lock().clone();
            if let Ok(rx) = pool.submit(task, Priority::Normal, Some(HANDLER_TIMEOUT)) {
                tokio::spawn(async move {
                    let Ok(result) = rx.await else { return };
                    let Ok(output) = result.outcome else { return };
                    let Ok(inner) = output.downcast::<Result<(), StreamError>>() else { return };
                    if let Err(err) = *inner {
                        metrics.counter("router_errors_total").incr();
                        metrics.counter(&format!("router_errors_total:{tag}")).incr();
                        if let Some(cb) = error_callback {
                            cb(tag, &err);
                        }
                    }
                });
            }
        }
    }
}

struct DeliveryTask {
    handler: Arc<dyn Handler>,
    envelope: Envelope,
}

#[async_trait]
impl Task for DeliveryTask {
    async fn execute(&self, _ctx: fleet_core::CancelScope) -> Result<TaskOutput, fleet_worker::WorkerError> {
        let result = self.handler.handle(&self.envelope).await;
        Ok(Box::new(result))
    }
}

async fn invoke(handler: Arc<dyn Handler>, envelope: Envelope) -> Result<(), StreamError> {
    let task = tokio::spawn(async move { handler.handle(&envelope).await });
    match tokio::time::timeout(HANDLER_TIMEOUT, task).await {
        Err(_elapsed) => Err(StreamError::HandlerTimeout),
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(StreamError::HandlerPanicked(join_err.to_string())),
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
