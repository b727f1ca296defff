// SPDX-License-Identifier: MIT

//! `PooledSession`: a `Session` plus pool bookkeeping (§3 PooledSession).
//!
//! Holds only a weak reference to the `Session` — the `SessionManager` is
//! the owner (§9 weak-reference redesign, same pattern as `Session`'s own
//! reference to its `Process`).

use fleet_core::SessionId;
use fleet_session::Session;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Weak;

pub struct PooledSession {
    pub session_id: SessionId,
    session: Weak<Session>,
    in_use: AtomicBool,
    acquired_at_ms: AtomicU64,
    last_released_at_ms: AtomicU64,
    use_count: AtomicU32,
    /// Per-session connection counter maintained by the load balancer
    /// (§4.5 LeastConnections: "increment on selection, decrement on
    /// release").
    connections: AtomicU32,
    affinity_key: Mutex<Option<String>>,
    weight: Mutex<f64>,
    response_time_ema_ms: Mutex<Option<f64>>,
}

impl PooledSession {
    pub fn new(session: &std::sync::Arc<Session>, epoch_ms: u64) -> Self {
        Self {
            session_id: session.id,
            session: std::sync::Arc::downgrade(session),
            in_use: AtomicBool::new(true),
            acquired_at_ms: AtomicU64::new(epoch_ms),
            last_released_at_ms: AtomicU64::new(epoch_ms),
            use_count: AtomicU32::new(1),
            connections: AtomicU32::new(0),
            affinity_key: Mutex::new(None),
            weight: Mutex::new(1.0),
            response_time_ema_ms: Mutex::new(None),
        }
    }

    pub fn session(&self) -> Option<std::sync::Arc<Session>> {
        self.session.upgrade()
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn use_count(&self) -> u32 {
        self.use_count.load(Ordering::Acquire)
    }

    pub fn acquired_at_ms(&self) -> u64 {
        self.acquired_at_ms.load(Ordering::Acquire)
    }

    pub fn last_released_at_ms(&self) -> u64 {
        self.last_released_at_ms.load(Ordering::Acquire)
    }

    pub fn connections(&self) -> u32 {
        self.connections.load(Ordering::Acquire)
    }

    pub fn incr_connections(&self) {
        self.connections.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decr_connections(&self) {
        self.connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(1)))
            .ok();
    }

    pub fn affinity_key(&self) -> Option<String> {
        self.affinity_key.lock().clone()
    }

    pub fn set_affinity_key(&self, key: Option<String>) {
        *self.affinity_key.lock() = key;
    }

    pub fn weight(&self) -> f64 {
        *self.weight.lock()
    }

    pub fn set_weight(&self, weight: f64) {
        *self.weight.lock() = weight;
    }

    pub fn response_time_ema_ms(&self) -> Option<f64> {
        *self.response_time_ema_ms.lock()
    }

    /// Fold a new observed response time into the EMA (α = 0.2).
    pub fn record_response_time_ms(&self, sample_ms: f64) {
        const ALPHA: f64 = 0.2;
        let mut ema = self.response_time_ema_ms.lock();
        *ema = Some(match *ema {
            Some(prev) => ALPHA * sample_ms + (1.0 - ALPHA) * prev,
            None => sample_ms,
        });
    }

    pub fn mark_acquired(&self, epoch_ms: u64) {
        self.in_use.store(true, Ordering::Release);
        self.acquired_at_ms.store(epoch_ms, Ordering::Release);
        self.use_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Flip in-use to false if it was true; returns whether this call
    /// actually performed the transition. A repeat release on an
    /// already-released session returns `false` so the caller can skip
    /// side effects (gauges, connection counters) that must only fire once
    /// per acquire.
    pub fn mark_released(&self, epoch_ms: u64) -> bool {
        let was_in_use = self.in_use.swap(false, Ordering::AcqRel);
        if was_in_use {
            self.last_released_at_ms.store(epoch_ms, Ordering::Release);
        }
        was_in_use
    }
}
