// SPDX-License-Identifier: MIT

//! Adaptive retry (§4.9.3): classify-gated backoff with an optional
//! circuit-breaker check and a background loop that tunes delay/attempt
//! counts per error kind from recent outcomes.

use crate::circuit_breaker::CircuitBreaker;
use crate::classifier::ErrorClassifier;
use crate::error::ResilienceError;
use fleet_core::{CancelScope, Clock, ErrorKind};
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
    Adaptive,
    DecorrelatedJitter,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicyConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    /// `Some(factor)` applies jitter in `[-factor, +factor]` to every delay.
    pub jitter: Option<f64>,
    pub circuit_breaker_gated: bool,
    pub adaptive_interval: Duration,
    pub adaptive_window: usize,
    pub failure_rate_threshold: f64,
    pub success_rate_threshold: f64,
    pub min_adjustment_factor: f64,
    pub max_adjustment_factor: f64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            strategy: BackoffStrategy::Exponential,
            jitter: Some(0.2),
            circuit_breaker_gated: false,
            adaptive_interval: Duration::from_secs(60),
            adaptive_window: 20,
            failure_rate_threshold: 0.5,
            success_rate_threshold: 0.9,
            min_adjustment_factor: 0.5,
            max_adjustment_factor: 3.0,
        }
    }
}

/// Per-call context: a cancellation scope and the error-kind family this
/// call belongs to, used to bucket adaptive tuning (§4.9.3 "per kind").
pub struct RetryContext {
    pub cancel: CancelScope,
    pub kind: ErrorKind,
}

impl RetryContext {
    pub fn new(kind: ErrorKind) -> Self {
        Self { cancel: CancelScope::root(), kind }
    }

    pub fn with_cancel(kind: ErrorKind, cancel: CancelScope) -> Self {
        Self { cancel, kind }
    }
}

/// Bounds a [`RetryPolicyConfig`] so the adaptive loop never walks it out
/// of a sane range (§4.9.3 "bounded by [min_adjustment_factor,
/// max_adjustment_factor]").
struct AdaptiveState {
    base_config: RetryPolicyConfig,
    factor: f64,
    last_eval_ms: u64,
}

pub struct AdaptiveRetry {
    config: Mutex<AdaptiveState>,
    classifier: Arc<ErrorClassifier>,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    clock: Arc<dyn Clock>,
    outcomes: Mutex<HashMap<ErrorKind, VecDeque<bool>>>,
    shutdown: CancellationToken,
}

impl AdaptiveRetry {
    pub fn new(config: RetryPolicyConfig, classifier: Arc<ErrorClassifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Mutex::new(AdaptiveState { base_config: config, factor: 1.0, last_eval_ms: clock.epoch_ms() }),
            classifier,
            circuit_breaker: None,
            clock,
            outcomes: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_circuit_breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(breaker);
        self
    }

    fn effective_config(&self) -> (RetryPolicyConfig, f64) {
        let state = self.config.lock();
        (state.base_config, state.factor)
    }

    fn record_outcome(&self, kind: ErrorKind, success: bool) {
        let window = self.config.lock().base_config.adaptive_window;
        let mut outcomes = self.outcomes.lock();
        let history = outcomes.entry(kind).or_default();
        if history.len() >= window {
            history.pop_front();
        }
        history.push_back(success);
        self.maybe_adapt();
    }

    /// §4.9.3 adaptive tuning loop step: every `adaptive_interval`, inflate
    /// or deflate delays and nudge `max_attempts` per the success rate over
    /// the last `adaptive_window` outcomes, for every kind with history.
    fn maybe_adapt(&self) {
        let now = self.clock.epoch_ms();
        let mut state = self.config.lock();
        let interval_ms = state.base_config.adaptive_interval.as_millis() as u64;
        if now.saturating_sub(state.last_eval_ms) < interval_ms {
            return;
        }
        state.last_eval_ms = now;

        let outcomes = self.outcomes.lock();
        let Some(success_rate) = overall_success_rate(&outcomes) else { return };
        let min_f = state.base_config.min_adjustment_factor;
        let max_f = state.base_config.max_adjustment_factor;
        if success_rate < state.base_config.failure_rate_threshold {
            state.factor = (state.factor * 1.5).min(max_f);
            state.base_config.max_attempts = state.base_config.max_attempts.saturating_sub(1).max(1);
        } else if success_rate > state.base_config.success_rate_threshold {
            state.factor = (state.factor / 1.5).max(min_f);
            state.base_config.max_attempts = (state.base_config.max_attempts + 1).min(10);
        }
        debug!(success_rate, factor = state.factor, max_attempts = state.base_config.max_attempts, "adaptive retry tuning step");
    }

    pub fn spawn_adaptive_loop(self: &Arc<Self>) {
        let engine = self.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let interval = engine.config.lock().base_config.adaptive_interval;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => engine.maybe_adapt(),
                    _ = shutdown.cancelled() => return,
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Run `op`, retrying per the configured backoff strategy (§4.9.3).
    pub async fn retry_with_backoff<T, E, F, Fut>(&self, ctx: &RetryContext, mut op: F) -> Result<T, ResilienceError>
    where
        F: FnMut(&RetryContext, u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let (config, factor) = self.effective_config();

        match op(ctx, 1).await {
            Ok(value) => {
                self.record_outcome(ctx.kind, true);
                return Ok(value);
            }
            Err(err) => {
                let message = err.to_string();
                let class = self.classifier.classify(&message);
                if !class.retryable {
                    self.record_outcome(ctx.kind, false);
                    return Err(ResilienceError::NotRetryable { kind: class.kind, message });
                }
                if config.circuit_breaker_gated {
                    if let Some(breaker) = &self.circuit_breaker {
                        if !breaker.allow() {
                            self.record_outcome(ctx.kind, false);
                            return Err(ResilienceError::CircuitOpen { next_attempt_ms: breaker.next_attempt_ms() });
                        }
                    }
                }
                if let Some(breaker) = &self.circuit_breaker {
                    breaker.record_failure();
                }

                let mut last_message = message;
                let mut prev_delay = config.base_delay;
                for attempt in 2..=config.max_attempts {
                    if ctx.cancel.is_cancelled() {
                        self.record_outcome(ctx.kind, false);
                        return Err(ResilienceError::Cancelled);
                    }

                    let delay = apply_jitter(
                        backoff_delay(config.strategy, attempt, config.base_delay, config.max_delay, prev_delay, factor),
                        config.jitter,
                    );
                    prev_delay = delay;

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancel.cancelled() => {
                            self.record_outcome(ctx.kind, false);
                            return Err(ResilienceError::Cancelled);
                        }
                    }

                    match op(ctx, attempt).await {
                        Ok(value) => {
                            self.record_outcome(ctx.kind, true);
                            if let Some(breaker) = &self.circuit_breaker {
                                breaker.record_success();
                            }
                            return Ok(value);
                        }
                        Err(err) => {
                            last_message = err.to_string();
                            let class = self.classifier.classify(&last_message);
                            if let Some(breaker) = &self.circuit_breaker {
                                breaker.record_failure();
                            }
                            if !class.retryable {
                                self.record_outcome(ctx.kind, false);
                                return Err(ResilienceError::NotRetryable { kind: class.kind, message: last_message });
                            }
                        }
                    }
                }

                self.record_outcome(ctx.kind, false);
                Err(ResilienceError::Exhausted { attempts: config.max_attempts, message: last_message })
            }
        }
    }
}

fn overall_success_rate(outcomes: &HashMap<ErrorKind, VecDeque<bool>>) -> Option<f64> {
    let (successes, total) = outcomes
        .values()
        .flat_map(|history| history.iter())
        .fold((0usize, 0usize), |(s, t), ok| (s + usize::from(*ok), t + 1));
    if total == 0 {
        None
    } else {
        Some(successes as f64 / total as f64)
    }
}

fn backoff_delay(
    strategy: BackoffStrategy,
    attempt: u32,
    base: Duration,
    max: Duration,
    prev: Duration,
    factor: f64,
) -> Duration {
    let base = scale_duration(base, factor);
    let max = scale_duration(max, factor);
    match strategy {
        BackoffStrategy::Fixed => base,
        BackoffStrategy::Linear => (base * attempt).min(max),
        BackoffStrategy::Exponential | BackoffStrategy::Adaptive => {
            let exp = 2u32.saturating_pow(attempt.saturating_sub(1));
            base.saturating_mul(exp).min(max)
        }
        BackoffStrategy::DecorrelatedJitter => {
            let upper = (prev.saturating_mul(3)).min(max).max(base);
            let lower_ms = base.as_millis() as u64;
            let upper_ms = upper.as_millis() as u64;
            let ms = if upper_ms > lower_ms { rand::rng().random_range(lower_ms..=upper_ms) } else { lower_ms };
            Duration::from_millis(ms)
        }
    }
}

fn scale_duration(d: Duration, factor: f64) -> Duration {
    Duration::from_secs_f64((d.as_secs_f64() * factor).max(0.0))
}

fn apply_jitter(delay: Duration, jitter: Option<f64>) -> Duration {
    let Some(j) = jitter else { return delay };
    let j = j.clamp(0.0, 1.0);
    let factor = 1.0 + rand::rng().random_range(-j..=j);
    Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
