// SPDX-License-Identifier: MIT

//! Event bus (§4.8.5): topic-keyed subscriptions, each delivered in its own
//! cooperative task over a bounded ring-buffer backlog.

use fleet_core::{Clock, SubscriptionId};
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

/// An event published on the bus. `topic` is the tag string it was
/// published under; `published_at_ms` is stamped on publish if unset.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at_ms: Option<u64>,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { topic: topic.into(), payload, published_at_ms: None }
    }
}

/// Bounded ring buffer a subscriber's background task drains; overflow
/// drops the oldest queued event (§4.8.5).
struct Backlog {
    events: Mutex<VecDeque<BusEvent>>,
    capacity: usize,
    notify: Notify,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self { events: Mutex::new(VecDeque::new()), capacity, notify: Notify::new() }
    }

    fn push(&self, event: BusEvent) -> bool {
        let mut events = self.events.lock();
        let dropped = if events.len() >= self.capacity {
            events.pop_front();
            true
        } else {
            false
        };
        events.push_back(event);
        drop(events);
        self.notify.notify_one();
        dropped
    }

    fn pop(&self) -> Option<BusEvent> {
        self.events.lock().pop_front()
    }
}

struct Subscriber {
    backlog: Arc<Backlog>,
    task: tokio::task::JoinHandle<()>,
}

const DEFAULT_BACKLOG: usize = 256;

pub struct EventBus {
    subscribers: Mutex<HashMap<SubscriptionId, Subscriber>>,
    topics: Mutex<Vec<(String, SubscriptionId)>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
    backlog_capacity: usize,
}

impl EventBus {
    pub fn new(clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_backlog(clock, metrics, DEFAULT_BACKLOG)
    }

    pub fn with_backlog(clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>, backlog_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            topics: Mutex::new(Vec::new()),
            clock,
            metrics,
            backlog_capacity,
        }
    }

    /// Subscribe to `topic` (or `""` for all topics); `handler` runs in its
    /// own spawned task per delivery, so a slow or panicking handler never
    /// blocks or kills delivery to other subscribers. Returns a handle for
    /// [`Self::unsubscribe`].
    pub fn subscribe<F, Fut>(&self, topic: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(BusEvent) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let topic = topic.into();
        let id = SubscriptionId::new();
        let backlog = Arc::new(Backlog::new(self.backlog_capacity));
        let handler = Arc::new(handler);
        let metrics = self.metrics.clone();

        let drain_backlog = backlog.clone();
        let task = tokio::spawn(async move {
            loop {
                while let Some(event) = drain_backlog.pop() {
                    let handler = handler.clone();
                    let metrics = metrics.clone();
                    tokio::spawn(async move {
                        let joined = tokio::spawn(async move { handler(event).await }).await;
                        if joined.is_err() {
                            metrics.counter("bus_subscriber_panics_total").incr();
                        }
                    });
                }
                drain_backlog.notify.notified().await;
            }
        });

        self.topics.lock().push((topic, id));
        self.subscribers.lock().insert(id, Subscriber { backlog, task });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(sub) = self.subscribers.lock().remove(&id) {
            sub.task.abort();
        }
        self.topics.lock().retain(|(_, sub_id)| *sub_id != id);
    }

    /// Deliver `event` to every subscriber of its topic plus every `""`
    /// (all-topics) subscriber.
    pub fn publish(&self, mut event: BusEvent) {
        if event.published_at_ms.is_none() {
            event.published_at_ms = Some(self.clock.epoch_ms());
        }
        self.metrics.counter("bus_events_published_total").incr();

        let subscribers = self.subscribers.lock();
        let topics = self.topics.lock();
        for (_, id) in topics.iter().filter(|(topic, _)| topic.is_empty() || *topic == event.topic) {
            if let Some(sub) = subscribers.get(id) {
                if sub.backlog.push(event.clone()) {
                    self.metrics.counter("bus_events_dropped_total").incr();
                }
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
