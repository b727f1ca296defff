// SPDX-License-Identifier: MIT

//! Utilization-driven autoscaler (§4.6). Decoupled from `SessionPool` by the
//! small [`PoolScaling`] trait so the autoscaler can drive any pool shape,
//! the way `fleet-worker` decomposes a god-trait into per-use-site traits
//! (§9 design note).

use async_trait::async_trait;
use fleet_core::Clock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

const HISTORY_CAP: usize = 100;

/// Snapshot of pool occupancy the autoscaler reasons about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalingStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
}

/// What an autoscaler needs from whatever pool it is driving.
#[async_trait]
pub trait PoolScaling: Send + Sync {
    fn pool_stats(&self) -> ScalingStats;
    async fn grow_by(&self, n: usize) -> usize;
    async fn shrink_by(&self, n: usize) -> usize;
    fn set_max(&self, n: usize);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoscalerConfig {
    pub min: usize,
    pub max: usize,
    pub target_utilization: f64,
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub scale_up_cooldown: Duration,
    pub scale_down_cooldown: Duration,
    pub scale_factor: f64,
    pub evaluation_window: Duration,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 32,
            target_utilization: 0.7,
            scale_up_threshold: 0.8,
            scale_down_threshold: 0.3,
            scale_up_cooldown: Duration::from_secs(60),
            scale_down_cooldown: Duration::from_secs(120),
            scale_factor: 1.5,
            evaluation_window: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScalingAction {
    pub reason: String,
    pub before: usize,
    pub after: usize,
    pub at_epoch_ms: u64,
}

pub struct Autoscaler {
    config: Mutex<AutoscalerConfig>,
    history: Mutex<VecDeque<ScalingAction>>,
    last_scale_up: Mutex<Option<Instant>>,
    last_scale_down: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl Autoscaler {
    pub fn new(config: AutoscalerConfig, clock: Arc<dyn Clock>) -> Arc<Self> {
        Arc::new(Self {
            config: Mutex::new(config),
            history: Mutex::new(VecDeque::new()),
            last_scale_up: Mutex::new(None),
            last_scale_down: Mutex::new(None),
            clock,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn history(&self) -> Vec<ScalingAction> {
        self.history.lock().iter().cloned().collect()
    }

    fn record(&self, reason: impl Into<String>, before: usize, after: usize) {
        let mut history = self.history.lock();
        if history.len() == HISTORY_CAP {
            history.pop_front();
        }
        history.push_back(ScalingAction {
            reason: reason.into(),
            before,
            after,
            at_epoch_ms: self.clock.epoch_ms(),
        });
    }

    fn cooldown_elapsed(&self, last: &Mutex<Option<Instant>>, cooldown: Duration) -> bool {
        match *last.lock() {
            None => true,
            Some(at) => self.clock.now().saturating_duration_since(at) >= cooldown,
        }
    }

    /// One pass of the §4.6 evaluation loop.
    pub async fn evaluate_once(&self, pool: &dyn PoolScaling) {
        let stats = pool.pool_stats();
        if stats.total == 0 {
            return;
        }
        let utilization = stats.active as f64 / stats.total as f64;
        let config = *self.config.lock();

        if utilization > config.scale_up_threshold
            && self.cooldown_elapsed(&self.last_scale_up, config.scale_up_cooldown)
        {
            let wanted = ((stats.total as f64) * (config.scale_factor - 1.0)).ceil() as usize;
            let target = (stats.total + wanted).min(config.max);
            let delta = target.saturating_sub(stats.total);
            if delta > 0 {
                let created = pool.grow_by(delta).await;
                info!(utilization, delta, created, "autoscaler scaling up");
                self.record(
                    format!("utilization {utilization:.2} above scale-up threshold"),
                    stats.total,
                    stats.total + created,
                );
                *self.last_scale_up.lock() = Some(self.clock.now());
            }
        } else if utilization < config.scale_down_threshold
            && self.cooldown_elapsed(&self.last_scale_down, config.scale_down_cooldown)
        {
            let wanted = ((stats.total as f64) * (1.0 - 1.0 / config.scale_factor)).ceil() as usize;
            let max_removable = stats.total.saturating_sub(config.min);
            let delta = wanted.min(max_removable).min(stats.idle);
            if delta > 0 {
                let removed = pool.shrink_by(delta).await;
                info!(utilization, delta, removed, "autoscaler scaling down");
                self.record(
                    format!("utilization {utilization:.2} below scale-down threshold"),
                    stats.total,
                    stats.total - removed,
                );
                *self.last_scale_down.lock() = Some(self.clock.now());
            }
        }
    }

    /// Manual scale-up, clamped to `max` (§4.6 "manual ... respect bounds").
    pub async fn scale_up_by(&self, n: usize, pool: &dyn PoolScaling) -> usize {
        let before = pool.pool_stats().total;
        let max = self.config.lock().max;
        let allowed = max.saturating_sub(before).min(n);
        let created = if allowed > 0 { pool.grow_by(allowed).await } else { 0 };
        self.record("manual scale_up_by", before, before + created);
        created
    }

    /// Manual scale-down, clamped to `min`.
    pub async fn scale_down_by(&self, n: usize, pool: &dyn PoolScaling) -> usize {
        let before = pool.pool_stats().total;
        let min = self.config.lock().min;
        let allowed = before.saturating_sub(min).min(n);
        let removed = if allowed > 0 { pool.shrink_by(allowed).await } else { 0 };
        self.record("manual scale_down_by", before, before.saturating_sub(removed));
        removed
    }

    pub fn set_max(&self, n: usize, pool: &dyn PoolScaling) {
        let before = self.config.lock().max;
        let n = n.max(self.config.lock().min);
        self.config.lock().max = n;
        pool.set_max(n);
        self.record("manual set_max", before, n);
    }

    /// Spawn the background evaluation loop at `evaluation_window`.
    pub fn spawn_loop(self: &Arc<Self>, pool: Arc<dyn PoolScaling>) {
        let autoscaler = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let interval = autoscaler.config.lock().evaluation_window;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => autoscaler.evaluate_once(pool.as_ref()).await,
                    _ = shutdown.cancelled() => return,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "autoscaler_tests.rs"]
mod tests;
