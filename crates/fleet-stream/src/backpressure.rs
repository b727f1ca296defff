// SPDX-License-Identifier: MIT

//! Backpressure handler (§4.8.3): bounded staging queue with a drop policy,
//! optional adaptive sizing, and a slow-consumer monitor.

use crate::error::StreamError;
use fleet_core::{CancelScope, Clock};
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    DropOldest,
    DropNewest,
    BlockUntilReady,
}

#[derive(Debug, Clone, Copy)]
pub struct AdaptiveConfig {
    pub min_size: usize,
    pub growth_rate: usize,
    pub shrink_rate: usize,
    pub evaluation_interval: Duration,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_size: 16,
            growth_rate: 32,
            shrink_rate: 16,
            evaluation_interval: Duration::from_secs(1),
        }
    }
}

struct State<T> {
    items: VecDeque<T>,
    max_size: usize,
    last_adapted_at_ms: u64,
}

pub struct BackpressureHandler<T> {
    state: Mutex<State<T>>,
    policy: DropPolicy,
    adaptive: Option<AdaptiveConfig>,
    consecutive_should_drop: AtomicU32,
    slow_consumer_threshold: u32,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsRegistry>,
}

impl<T> BackpressureHandler<T> {
    pub fn new(
        max_size: usize,
        policy: DropPolicy,
        adaptive: Option<AdaptiveConfig>,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            state: Mutex::new(State { items: VecDeque::new(), max_size, last_adapted_at_ms: clock.epoch_ms() }),
            policy,
            adaptive,
            consecutive_should_drop: AtomicU32::new(0),
            slow_consumer_threshold: 5,
            clock,
            metrics,
        }
    }

    pub fn with_slow_consumer_threshold(mut self, threshold: u32) -> Self {
        self.slow_consumer_threshold = threshold;
        self
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.state.lock().max_size
    }

    /// True when the handler is at capacity and a push would need to drop
    /// or block (§4.8.3 "returns true when full, except under
    /// BlockUntilReady").
    pub fn should_drop(&self) -> bool {
        if self.policy == DropPolicy::BlockUntilReady {
            return false;
        }
        let state = self.state.lock();
        state.items.len() >= state.max_size
    }

    /// Offer an item under the configured drop policy.
    pub fn push(&self, item: T) -> Result<(), StreamError> {
        self.maybe_adapt();

        let full_before = {
            let state = self.state.lock();
            state.items.len() >= state.max_size
        };

        if full_before {
            let count = self.consecutive_should_drop.fetch_add(1, Ordering::Relaxed) + 1;
            if count >= self.slow_consumer_threshold {
                self.metrics.counter("stream_slow_consumer_count").incr();
                self.force_adapt();
                self.consecutive_should_drop.store(0, Ordering::Relaxed);
            }
        } else {
            self.consecutive_should_drop.store(0, Ordering::Relaxed);
        }

        let mut state = self.state.lock();
        match self.policy {
            DropPolicy::DropOldest => {
                if state.items.len() >= state.max_size {
                    state.items.pop_front();
                    self.metrics.backpressure_events().incr();
                }
                state.items.push_back(item);
                Ok(())
            }
            DropPolicy::DropNewest | DropPolicy::BlockUntilReady => {
                if state.items.len() >= state.max_size {
                    self.metrics.backpressure_events().incr();
                    Err(StreamError::Dropped)
                } else {
                    state.items.push_back(item);
                    Ok(())
                }
            }
        }
    }

    pub fn pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Poll every 10ms until there is room, or `ctx` is cancelled
    /// (§4.8.3 BlockUntilReady `wait_for_space`).
    pub async fn wait_for_space(&self, ctx: &CancelScope) -> bool {
        loop {
            if self.len() < self.max_size() {
                return true;
            }
            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = ctx.cancelled() => return false,
            }
        }
    }

    fn maybe_adapt(&self) {
        let Some(adaptive) = self.adaptive else { return };
        let now = self.clock.epoch_ms();
        let mut state = self.state.lock();
        if now.saturating_sub(state.last_adapted_at_ms) < adaptive.evaluation_interval.as_millis() as u64 {
            return;
        }
        state.last_adapted_at_ms = now;
        apply_adaptive_step(&mut state, adaptive);
    }

    fn force_adapt(&self) {
        let Some(adaptive) = self.adaptive else { return };
        let mut state = self.state.lock();
        apply_adaptive_step(&mut state, adaptive);
    }
}

fn apply_adaptive_step<T>(state: &mut State<T>, adaptive: AdaptiveConfig) {
    let usage = state.items.len() as f64 / state.max_size as f64;
    if usage > 0.8 {
        state.max_size += adaptive.growth_rate;
    } else if usage < 0.2 && state.max_size > adaptive.min_size {
        state.max_size = state.max_size.saturating_sub(adaptive.shrink_rate).max(adaptive.min_size);
    }
}

#[cfg(test)]
#[path = "backpressure_tests.rs"]
mod tests;
