// SPDX-License-Identifier: MIT

//! Circuit breaker (§4.9.2): a 10-bucket, 1-minute sliding window deciding
//! Closed/Open/HalfOpen transitions.

use fleet_core::Clock;
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const NUM_BUCKETS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub request_volume_threshold: u32,
    pub error_percentage_threshold: f64,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub recovery_timeout: Duration,
    pub bucket_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            request_volume_threshold: 20,
            error_percentage_threshold: 50.0,
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            bucket_duration: Duration::from_secs(6),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    requests: u32,
    failures: u32,
    bucket_start_ms: u64,
}

struct Inner {
    state: CircuitState,
    buckets: VecDeque<Bucket>,
    consecutive_failures: u32,
    half_open_successes: u32,
    next_attempt_ms: u64,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                buckets: VecDeque::new(),
                consecutive_failures: 0,
                half_open_successes: 0,
                next_attempt_ms: 0,
            }),
            config,
            clock,
            metrics,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// The epoch-ms timestamp at which an Open circuit will next allow a
    /// probe request. Meaningless (0) while Closed or HalfOpen.
    pub fn next_attempt_ms(&self) -> u64 {
        self.inner.lock().next_attempt_ms
    }

    /// Decide whether a call may proceed, advancing Open → HalfOpen once
    /// the recovery timeout has elapsed (§4.9.2).
    pub fn allow(&self) -> bool {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                if now >= inner.next_attempt_ms {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    self.metrics.counter("circuit_breaker_half_open_total").incr();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        rotate_buckets(&mut inner.buckets, now, self.config.bucket_duration);
        if let Some(bucket) = inner.buckets.back_mut() {
            bucket.requests += 1;
        }
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.half_open_successes += 1;
            if inner.half_open_successes >= self.config.success_threshold {
                inner.state = CircuitState::Closed;
                inner.buckets.clear();
                self.metrics.counter("circuit_breaker_closed_total").incr();
            }
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.epoch_ms();
        let mut inner = self.inner.lock();
        rotate_buckets(&mut inner.buckets, now, self.config.bucket_duration);
        if let Some(bucket) = inner.buckets.back_mut() {
            bucket.requests += 1;
            bucket.failures += 1;
        }
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::HalfOpen => self.trip(&mut inner, now),
            CircuitState::Closed => {
                let (requests, failures): (u32, u32) =
                    inner.buckets.iter().fold((0, 0), |(r, f), b| (r + b.requests, f + b.failures));
                let error_pct = if requests > 0 { failures as f64 / requests as f64 * 100.0 } else { 0.0 };
                if requests >= self.config.request_volume_threshold
                    && (error_pct >= self.config.error_percentage_threshold
                        || inner.consecutive_failures >= self.config.failure_threshold)
                {
                    self.trip(&mut inner, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn trip(&self, inner: &mut Inner, now_ms: u64) {
        inner.state = CircuitState::Open;
        inner.next_attempt_ms = now_ms + self.config.recovery_timeout.as_millis() as u64;
        self.metrics.counter("circuit_breaker_opened_total").incr();
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.buckets.clear();
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.next_attempt_ms = 0;
    }
}

/// Advance the bucket deque to cover `now_ms`, evicting buckets that have
/// aged out of the window; a gap larger than the window just starts fresh.
fn rotate_buckets(buckets: &mut VecDeque<Bucket>, now_ms: u64, bucket_duration: Duration) {
    let bucket_ms = bucket_duration.as_millis().max(1) as u64;
    let current_start = (now_ms / bucket_ms) * bucket_ms;

    match buckets.back() {
        None => buckets.push_back(Bucket { requests: 0, failures: 0, bucket_start_ms: current_start }),
        Some(back) if back.bucket_start_ms == current_start => {}
        Some(back) => {
            let gap_buckets = (current_start - back.bucket_start_ms) / bucket_ms;
            if gap_buckets as usize >= NUM_BUCKETS {
                buckets.clear();
            }
            buckets.push_back(Bucket { requests: 0, failures: 0, bucket_start_ms: current_start });
        }
    }
    while buckets.len() > NUM_BUCKETS {
        buckets.pop_front();
    }
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;
