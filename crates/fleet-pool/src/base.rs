// SPDX-License-Identifier: MIT

//! Base session pool (§4.4): acquire/release, sweeper, stats. Pool
//! mutations are serialized by a single lock (§4.4 concurrency note).

use crate::error::PoolError;
use crate::pooled::PooledSession;
use fleet_core::{Clock, SessionId};
use fleet_metrics::MetricsRegistry;
use fleet_process::ProcessConfig;
use fleet_session::{SessionConfig, SessionManager};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
}

pub struct PoolConfig {
    pub max: usize,
    pub cleanup_interval: Duration,
    pub max_idle: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: 32,
            cleanup_interval: Duration::from_secs(30),
            max_idle: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(4 * 3600),
        }
    }
}

pub struct SessionPool {
    manager: Arc<SessionManager>,
    metrics: Arc<MetricsRegistry>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<SessionId, Arc<PooledSession>>>,
    pub(crate) config: Mutex<PoolConfig>,
    shutdown: CancellationToken,
}

impl SessionPool {
    pub fn new(
        manager: Arc<SessionManager>,
        metrics: Arc<MetricsRegistry>,
        clock: Arc<dyn Clock>,
        config: PoolConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            manager,
            metrics,
            clock,
            entries: Mutex::new(HashMap::new()),
            config: Mutex::new(config),
            shutdown: CancellationToken::new(),
        })
    }

    /// Select an idle session whose config matches, or create one if the
    /// pool has room (§4.4 `acquire`).
    pub async fn acquire(
        &self,
        workspace_id: &str,
        user_id: &str,
        config: &SessionConfig,
        process_config: ProcessConfig,
    ) -> Result<Arc<PooledSession>, PoolError> {
        if let Some(pooled) = self.find_idle_match(config) {
            pooled.mark_acquired(self.clock.epoch_ms());
            self.metrics.gauge("pool_active_sessions").add(1);
            return Ok(pooled);
        }

        let max = self.config.lock().max;
        if self.entries.lock().len() >= max {
            return Err(PoolError::PoolFull);
        }

        let session =
            self.manager.create(workspace_id, user_id, config.clone(), process_config).await?;
        let pooled = Arc::new(PooledSession::new(&session, self.clock.epoch_ms()));
        self.entries.lock().insert(session.id, pooled.clone());
        self.metrics.counter("pool_sessions_created_total").incr();
        self.metrics.gauge("pool_active_sessions").add(1);
        Ok(pooled)
    }

    /// All idle sessions whose config matches (§4.5 step 3 candidate set
    /// for the load balancer, a superset of [`Self::find_idle_match`]'s
    /// first-match shortcut).
    pub fn idle_sessions_matching(&self, config: &SessionConfig) -> Vec<Arc<PooledSession>> {
        self.entries
            .lock()
            .values()
            .filter(|pooled| {
                !pooled.is_in_use()
                    && pooled.session().map(|s| s.config().matches_for_pooling(config)).unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn find_idle_match(&self, config: &SessionConfig) -> Option<Arc<PooledSession>> {
        self.entries.lock().values().find_map(|pooled| {
            if pooled.is_in_use() {
                return None;
            }
            let session = pooled.session()?;
            if session.config().matches_for_pooling(config) {
                Some(pooled.clone())
            } else {
                None
            }
        })
    }

    /// Flip in-use=false and record last-released-at. Idempotent-on-error:
    /// releasing an unknown id is an explicit error, never a silent no-op
    /// (§4.4 `release`). Returns whether this call actually released the
    /// session (`false` on a repeat release), so the gauge is only
    /// decremented once per acquire.
    pub fn release(&self, id: SessionId) -> Result<bool, PoolError> {
        let entries = self.entries.lock();
        let pooled = entries.get(&id).ok_or(PoolError::NotFound(id))?;
        let released = pooled.mark_released(self.clock.epoch_ms());
        if released {
            self.metrics.gauge("pool_active_sessions").add(-1);
        }
        Ok(released)
    }

    pub fn get(&self, id: SessionId) -> Option<Arc<PooledSession>> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn stats(&self) -> PoolStats {
        let entries = self.entries.lock();
        let total = entries.len();
        let active = entries.values().filter(|p| p.is_in_use()).count();
        PoolStats { total, active, idle: total - active }
    }

    /// Evict sessions idle longer than `max_idle` or alive longer than
    /// `max_lifetime` (§4.4 background sweeper).
    pub async fn sweep_once(&self) {
        let (max_idle, max_lifetime) = {
            let config = self.config.lock();
            (config.max_idle, config.max_lifetime)
        };
        let now = self.clock.epoch_ms();
        let to_evict: Vec<SessionId> = {
            let entries = self.entries.lock();
            entries
                .values()
                .filter(|pooled| {
                    if pooled.is_in_use() {
                        return false;
                    }
                    let Some(session) = pooled.session() else { return true };
                    let idle_ms = now.saturating_sub(pooled.last_released_at_ms());
                    let lifetime_ms = now.saturating_sub(session.created_at_ms());
                    idle_ms > max_idle.as_millis() as u64 || lifetime_ms > max_lifetime.as_millis() as u64
                })
                .map(|pooled| pooled.session_id)
                .collect()
        };

        for id in to_evict {
            info!(session_id = %id, "pool sweeper evicting session");
            let _ = self.manager.close(id).await;
            self.entries.lock().remove(&id);
            self.metrics.counter("pool_sweep_evictions_total").incr();
        }
    }

    /// Explicitly close and remove a session (as opposed to the sweeper's
    /// time-based eviction).
    pub async fn close(&self, id: SessionId) -> Result<(), PoolError> {
        self.manager.close(id).await?;
        self.entries.lock().remove(&id);
        Ok(())
    }

    /// Evict up to `n` idle sessions immediately (autoscaler scale-down,
    /// or a manual call); returns how many were actually evicted.
    pub async fn evict_n_idle(&self, n: usize) -> usize {
        let ids: Vec<SessionId> = {
            let entries = self.entries.lock();
            entries.values().filter(|p| !p.is_in_use()).take(n).map(|p| p.session_id).collect()
        };
        for id in &ids {
            let _ = self.manager.close(*id).await;
            self.entries.lock().remove(id);
        }
        ids.len()
    }

    pub fn set_max(&self, max: usize) {
        self.config.lock().max = max;
    }

    pub fn max(&self) -> usize {
        self.config.lock().max
    }

    /// Spawn the background sweeper loop at `cleanup_interval`.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let pool = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let interval = pool.config.lock().cleanup_interval;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => pool.sweep_once().await,
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
#[path = "base_tests.rs"]
mod tests;
