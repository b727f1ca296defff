// SPDX-License-Identifier: MIT

//! Resilience layer (§4.9): error classification, a circuit breaker, an
//! adaptive retry engine, and a recovery orchestrator, composed around the
//! errors a supervised child process and its session can raise.

pub mod circuit_breaker;
pub mod classifier;
pub mod error;
pub mod recovery;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use classifier::{ClassifiedBy, ErrorClass, ErrorClassifier, PatternRule};
pub use error::ResilienceError;
pub use recovery::{
    network_reset_strategy, recreate_session_strategy, resource_cleanup_strategy, restart_process_strategy,
    RecoveryExecution, RecoveryOrchestrator, RecoveryOrchestratorConfig, RecoveryRecord, RecoveryStatus,
    RecoveryStrategy, RecoveryTarget,
};
pub use retry::{AdaptiveRetry, BackoffStrategy, RetryContext, RetryPolicyConfig};
pub use fleet_core::RecoveryExecutionId;
