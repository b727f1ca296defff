// SPDX-License-Identifier: MIT

//! Pull-model metrics surface (§6): gauges, counters, histograms shared by
//! every subsystem.
//!
//! A [`MetricsRegistry`] is constructed once per runtime and passed by
//! explicit handle (`Arc<MetricsRegistry>`) into each subsystem's
//! constructor — never a global singleton (§9 design note on global mutable
//! state). Translating a [`Snapshot`] into a scrape format (Prometheus text
//! or otherwise) is an external collaborator's concern, out of scope here.

mod histogram;

pub use histogram::Histogram;

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A value that can move up or down.
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn set(&self, v: i64) {
        self.0.store(v, Ordering::Relaxed);
    }

    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the whole registry, serializable for an external
/// scrape adapter to translate (the translation itself is out of scope).
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub counters: HashMap<String, u64>,
    pub gauges: HashMap<String, i64>,
    pub histograms: HashMap<String, histogram::HistogramSnapshot>,
}

/// The shared metrics handle every subsystem is constructed with.
///
/// Named metrics from §6 are exposed as typed accessors so call sites read
/// `registry.active_sessions().set(n)` instead of stringly-typed lookups;
/// `counter`/`gauge`/`histogram` remain available for subsystem-local
/// metrics (e.g. per-tag router counts) that aren't enumerated in §6.
#[derive(Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, Arc<Counter>>>,
    gauges: RwLock<HashMap<String, Arc<Gauge>>>,
    histograms: RwLock<HashMap<String, Arc<Histogram>>>,
}

impl MetricsRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn counter(&self, name: &str) -> Arc<Counter> {
        if let Some(c) = self.counters.read().get(name) {
            return c.clone();
        }
        self.counters.write().entry(name.to_string()).or_insert_with(|| Arc::new(Counter::default())).clone()
    }

    pub fn gauge(&self, name: &str) -> Arc<Gauge> {
        if let Some(g) = self.gauges.read().get(name) {
            return g.clone();
        }
        self.gauges.write().entry(name.to_string()).or_insert_with(|| Arc::new(Gauge::default())).clone()
    }

    pub fn histogram(&self, name: &str) -> Arc<Histogram> {
        if let Some(h) = self.histograms.read().get(name) {
            return h.clone();
        }
        self.histograms.write().entry(name.to_string()).or_insert_with(|| Arc::new(Histogram::new(1000))).clone()
    }

    // §6 named metrics.
    pub fn active_sessions(&self) -> Arc<Gauge> {
        self.gauge("active_sessions")
    }
    pub fn sessions_created(&self) -> Arc<Counter> {
        self.counter("sessions_created_total")
    }
    pub fn sessions_completed(&self) -> Arc<Counter> {
        self.counter("sessions_completed_total")
    }
    pub fn sessions_failed(&self) -> Arc<Counter> {
        self.counter("sessions_failed_total")
    }
    pub fn session_lifetime(&self) -> Arc<Histogram> {
        self.histogram("session_lifetime_ms")
    }
    pub fn buffer_occupancy(&self) -> Arc<Gauge> {
        self.gauge("buffer_occupancy")
    }
    pub fn backpressure_events(&self) -> Arc<Counter> {
        self.counter("backpressure_events_total")
    }
    pub fn slow_consumer_count(&self) -> Arc<Counter> {
        self.counter("slow_consumer_count")
    }
    pub fn handler_routed(&self, tag: &str) -> Arc<Counter> {
        self.counter(&format!("handler_routed_total{{tag={tag}}}"))
    }
    pub fn handler_errored(&self, tag: &str) -> Arc<Counter> {
        self.counter(&format!("handler_errored_total{{tag={tag}}}"))
    }
    pub fn retry_outcome(&self, kind: &str, outcome: &str) -> Arc<Counter> {
        self.counter(&format!("retry_outcomes_total{{kind={kind},outcome={outcome}}}"))
    }
    pub fn circuit_state_changes(&self) -> Arc<Counter> {
        self.counter("circuit_breaker_state_changes_total")
    }
    pub fn recovery_executions(&self) -> Arc<Counter> {
        self.counter("recovery_executions_total")
    }

    /// Snapshot every registered metric for an external collaborator to pull.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            counters: self.counters.read().iter().map(|(k, v)| (k.clone(), v.get())).collect(),
            gauges: self.gauges.read().iter().map(|(k, v)| (k.clone(), v.get())).collect(),
            histograms: self.histograms.read().iter().map(|(k, v)| (k.clone(), v.snapshot())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let registry = MetricsRegistry::new();
        registry.sessions_created().incr();
        registry.sessions_created().incr();
        assert_eq!(registry.sessions_created().get(), 2);
    }

    #[test]
    fn gauge_reflects_latest_set() {
        let registry = MetricsRegistry::new();
        registry.active_sessions().set(5);
        registry.active_sessions().set(3);
        assert_eq!(registry.active_sessions().get(), 3);
    }

    #[test]
    fn snapshot_includes_registered_metrics() {
        let registry = MetricsRegistry::new();
        registry.sessions_failed().incr();
        registry.buffer_occupancy().set(42);
        let snap = registry.snapshot();
        assert_eq!(snap.counters.get("sessions_failed_total"), Some(&1));
        assert_eq!(snap.gauges.get("buffer_occupancy"), Some(&42));
    }

    #[test]
    fn per_tag_handler_counters_are_independent() {
        let registry = MetricsRegistry::new();
        registry.handler_routed("text").incr();
        registry.handler_routed("error").incr();
        registry.handler_routed("error").incr();
        assert_eq!(registry.handler_routed("text").get(), 1);
        assert_eq!(registry.handler_routed("error").get(), 2);
    }
}
