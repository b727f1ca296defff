// SPDX-License-Identifier: MIT

//! Process supervisor errors.

use crate::state::ProcessState;
use fleet_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("invalid process config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid transition ({from}, {to})")]
    InvalidTransition { from: ProcessState, to: ProcessState },

    #[error("process already running or starting")]
    AlreadyRunning,

    #[error("failed to spawn child process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("failed to signal process: {0}")]
    SignalFailed(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("process is not running")]
    NotRunning,
}
