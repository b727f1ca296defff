// SPDX-License-Identifier: MIT

//! Load-balancing strategies over idle pooled sessions (§4.5).

use crate::pooled::PooledSession;
use fleet_session::SessionState;
use rand::seq::SliceRandom;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBalancerStrategy {
    RoundRobin,
    LeastConnections,
    WeightedRoundRobin,
    ResourceBased,
    ResponseTimeBased,
}

/// connections/10 (§4.5 scoring).
pub fn load_score(pooled: &PooledSession) -> f64 {
    pooled.connections() as f64 / 10.0
}

/// 0 for Closed, 0.1 for Error, otherwise 1.0 with a freshness boost below
/// 10 uses and a decay past 100 uses (§4.5 scoring).
pub fn health_score(pooled: &PooledSession) -> f64 {
    let Some(session) = pooled.session() else { return 0.0 };
    match session.state() {
        SessionState::Closed => 0.0,
        SessionState::Error => 0.1,
        _ => {
            let uses = pooled.use_count();
            if uses < 10 {
                0.8 + 0.02 * uses as f64
            } else if uses > 100 {
                (1.0 - 0.001 * uses as f64).max(0.3)
            } else {
                1.0
            }
        }
    }
}

/// Stepwise score over the observed response-time EMA; sessions with no
/// sample yet score as the worst bucket so they don't dominate selection
/// on an unproven guess (§4.5 scoring).
pub fn response_score(pooled: &PooledSession) -> f64 {
    match pooled.response_time_ema_ms() {
        None => 1.0,
        Some(ms) if ms < 100.0 => 0.1,
        Some(ms) if ms < 500.0 => 0.3,
        Some(ms) if ms < 1000.0 => 0.5,
        Some(ms) if ms < 5000.0 => 0.8,
        Some(_) => 1.0,
    }
}

/// health_score · 1/(1 + load_score + response_score) (§4.5 WeightedRoundRobin).
pub fn weight_score(pooled: &PooledSession) -> f64 {
    health_score(pooled) * (1.0 / (1.0 + load_score(pooled) + response_score(pooled)))
}

pub struct LoadBalancer {
    strategy: LoadBalancerStrategy,
    round_robin: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(strategy: LoadBalancerStrategy) -> Self {
        Self { strategy, round_robin: AtomicUsize::new(0) }
    }

    pub fn strategy(&self) -> LoadBalancerStrategy {
        self.strategy
    }

    /// Select among `idle` per the configured strategy. `None` if `idle` is
    /// empty.
    pub async fn select(&self, idle: &[Arc<PooledSession>]) -> Option<Arc<PooledSession>> {
        if idle.is_empty() {
            return None;
        }
        match self.strategy {
            LoadBalancerStrategy::RoundRobin => Some(self.round_robin_pick(idle)),
            LoadBalancerStrategy::LeastConnections => {
                idle.iter().min_by_key(|p| p.connections()).cloned()
            }
            LoadBalancerStrategy::WeightedRoundRobin => Some(self.weighted_round_robin_pick(idle)),
            LoadBalancerStrategy::ResourceBased => idle
                .iter()
                .max_by(|a, b| weight_score(a).total_cmp(&weight_score(b)))
                .cloned(),
            LoadBalancerStrategy::ResponseTimeBased => {
                if idle.iter().all(|p| p.response_time_ema_ms().is_none()) {
                    Some(self.round_robin_pick(idle))
                } else {
                    idle.iter()
                        .min_by(|a, b| {
                            let a = a.response_time_ema_ms().unwrap_or(f64::MAX);
                            let b = b.response_time_ema_ms().unwrap_or(f64::MAX);
                            a.total_cmp(&b)
                        })
                        .cloned()
                }
            }
        }
    }

    fn round_robin_pick(&self, idle: &[Arc<PooledSession>]) -> Arc<PooledSession> {
        let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % idle.len();
        idle[idx].clone()
    }

    fn weighted_round_robin_pick(&self, idle: &[Arc<PooledSession>]) -> Arc<PooledSession> {
        let mut expanded: Vec<Arc<PooledSession>> = Vec::new();
        for pooled in idle {
            let repeats = (10.0 * weight_score(pooled)).ceil().max(1.0) as usize;
            for _ in 0..repeats {
                expanded.push(pooled.clone());
            }
        }
        expanded.shuffle(&mut rand::rng());
        let idx = self.round_robin.fetch_add(1, Ordering::Relaxed) % expanded.len();
        expanded[idx].clone()
    }
}

#[cfg(test)]
#[path = "lb_tests.rs"]
mod tests;
