// SPDX-License-Identifier: MIT

//! Resilience layer errors.

use fleet_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("circuit breaker is open, next attempt at {next_attempt_ms}")]
    CircuitOpen { next_attempt_ms: u64 },

    #[error("not retryable ({kind}): {message}")]
    NotRetryable { kind: ErrorKind, message: String },

    #[error("retry cancelled")]
    Cancelled,

    #[error("exhausted {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("max concurrent recoveries reached")]
    RecoveryCapacityExceeded,

    #[error("no recovery strategy can handle this error")]
    NoStrategyAvailable,

    #[error("recovery timed out")]
    RecoveryTimedOut,
}
