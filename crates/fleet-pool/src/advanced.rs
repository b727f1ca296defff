// SPDX-License-Identifier: MIT

//! Advanced session pool (§4.5): composes the base pool, autoscaler, and
//! load balancer by explicit field injection — constructor-composed, never
//! a global (§9 design note on global mutable state).

use crate::autoscaler::{Autoscaler, PoolScaling, ScalingStats};
use crate::base::{PoolStats, SessionPool};
use crate::error::PoolError;
use crate::lb::LoadBalancer;
use crate::pooled::PooledSession;
use async_trait::async_trait;
use fleet_core::{Clock, SessionId};
use fleet_metrics::MetricsRegistry;
use fleet_process::ProcessConfig;
use fleet_session::{SessionConfig, SessionState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Caller context an acquire is made on behalf of (§4.5 step 2 affinity key).
#[derive(Debug, Clone)]
pub struct AcquireRequest {
    pub workspace_id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub config: SessionConfig,
    pub process_config: ProcessConfig,
}

fn affinity_key(req: &AcquireRequest) -> String {
    format!("{}:{}:{}", req.workspace_id, req.user_id, req.project_id.as_deref().unwrap_or(""))
}

pub struct AdvancedPoolConfig {
    pub autoscaling_enabled: bool,
    pub system_load_rejection_threshold: f64,
}

impl Default for AdvancedPoolConfig {
    fn default() -> Self {
        Self { autoscaling_enabled: true, system_load_rejection_threshold: 0.9 }
    }
}

pub struct AdvancedSessionPool {
    base: Arc<SessionPool>,
    autoscaler: Arc<Autoscaler>,
    lb: LoadBalancer,
    metrics: Arc<MetricsRegistry>,
    clock: Arc<dyn Clock>,
    config: AdvancedPoolConfig,
    affinity: Mutex<HashMap<String, SessionId>>,
    system_load: Arc<dyn Fn() -> f64 + Send + Sync>,
    last_request_shape: Mutex<Option<AcquireRequest>>,
}

impl AdvancedSessionPool {
    pub fn new(
        base: Arc<SessionPool>,
        autoscaler: Arc<Autoscaler>,
        lb: LoadBalancer,
        metrics: Arc<MetricsRegistry>,
        clock: Arc<dyn Clock>,
        config: AdvancedPoolConfig,
        system_load: Arc<dyn Fn() -> f64 + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            base,
            autoscaler,
            lb,
            metrics,
            clock,
            config,
            affinity: Mutex::new(HashMap::new()),
            system_load,
            last_request_shape: Mutex::new(None),
        })
    }

    pub fn stats(&self) -> PoolStats {
        self.base.stats()
    }

    pub fn autoscaler(&self) -> &Arc<Autoscaler> {
        &self.autoscaler
    }

    /// §4.5 `acquire`: system-load gate, affinity, load balancer, then base
    /// pool with one scale-up-and-retry on exhaustion.
    pub async fn acquire(&self, req: AcquireRequest) -> Result<Arc<PooledSession>, PoolError> {
        if (self.system_load)() > self.config.system_load_rejection_threshold {
            self.metrics.counter("pool_acquisition_failed_total").incr();
            return Err(PoolError::SystemOverloaded);
        }
        *self.last_request_shape.lock() = Some(req.clone());

        let key = affinity_key(&req);
        if let Some(pooled) = self.try_affinity(&key) {
            self.metrics.counter("pool_affinity_hit_total").incr();
            return Ok(pooled);
        }

        let idle = self.base.idle_sessions_matching(&req.config);
        if let Some(pooled) = self.lb.select(&idle).await {
            pooled.mark_acquired(self.clock.epoch_ms());
            pooled.incr_connections();
            self.affinity.lock().insert(key, pooled.session_id);
            self.metrics.counter("pool_load_balanced_total").incr();
            return Ok(pooled);
        }

        match self
            .base
            .acquire(&req.workspace_id, &req.user_id, &req.config, req.process_config.clone())
            .await
        {
            Ok(pooled) => {
                self.affinity.lock().insert(key, pooled.session_id);
                self.metrics.counter("pool_acquired_total").incr();
                Ok(pooled)
            }
            Err(PoolError::PoolFull) if self.config.autoscaling_enabled => {
                self.autoscaler.set_max(self.base.max() + 1, self);
                let pooled = self
                    .base
                    .acquire(&req.workspace_id, &req.user_id, &req.config, req.process_config)
                    .await
                    .inspect_err(|_| {
                        self.metrics.counter("pool_acquisition_failed_total").incr();
                    })?;
                self.affinity.lock().insert(key, pooled.session_id);
                self.metrics.counter("pool_acquired_total").incr();
                Ok(pooled)
            }
            Err(err) => {
                self.metrics.counter("pool_acquisition_failed_total").incr();
                Err(err)
            }
        }
    }

    fn try_affinity(&self, key: &str) -> Option<Arc<PooledSession>> {
        let id = *self.affinity.lock().get(key)?;
        let pooled = self.base.get(id)?;
        if pooled.is_in_use() {
            return None;
        }
        let session = pooled.session()?;
        if matches!(session.state(), SessionState::Closed | SessionState::Error) {
            self.affinity.lock().remove(key);
            return None;
        }
        pooled.mark_acquired(self.clock.epoch_ms());
        Some(pooled)
    }

    /// Release a session and invalidate any affinity mapping pointing at it
    /// if it has since closed or errored (§4.5 "affinity invalidated on
    /// session close/error").
    pub fn release(&self, id: SessionId) -> Result<(), PoolError> {
        let released = self.base.release(id)?;
        if let Some(pooled) = self.base.get(id) {
            if released {
                pooled.decr_connections();
            }
            let closed_or_errored = pooled
                .session()
                .map(|s| matches!(s.state(), SessionState::Closed | SessionState::Error))
                .unwrap_or(true);
            if closed_or_errored {
                self.affinity.lock().retain(|_, v| *v != id);
            }
        }
        Ok(())
    }

    /// Close a session and drop any affinity mapping pointing at it (§4.5
    /// "affinity invalidated on session close/error").
    pub async fn close(&self, id: SessionId) -> Result<(), PoolError> {
        self.base.close(id).await?;
        self.affinity.lock().retain(|_, v| *v != id);
        Ok(())
    }
}

#[async_trait]
impl PoolScaling for AdvancedSessionPool {
    fn pool_stats(&self) -> ScalingStats {
        let stats = self.base.stats();
        ScalingStats { total: stats.total, active: stats.active, idle: stats.idle }
    }

    async fn grow_by(&self, n: usize) -> usize {
        let Some(template) = self.last_request_shape.lock().clone() else { return 0 };
        let mut created = 0;
        for _ in 0..n {
            match self
                .base
                .acquire(
                    &template.workspace_id,
                    &template.user_id,
                    &template.config,
                    template.process_config.clone(),
                )
                .await
            {
                Ok(pooled) => {
                    let _ = self.base.release(pooled.session_id);
                    created += 1;
                }
                Err(_) => break,
            }
        }
        created
    }

    async fn shrink_by(&self, n: usize) -> usize {
        self.base.evict_n_idle(n).await
    }

    fn set_max(&self, n: usize) {
        self.base.set_max(n);
    }
}

#[cfg(test)]
#[path = "advanced_tests.rs"]
mod tests;
