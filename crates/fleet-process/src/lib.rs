// SPDX-License-Identifier: MIT

//! Owns the lifecycle of one external CLI subprocess (§3 Process, §4.1).

pub mod config;
pub mod error;
pub mod health;
pub mod state;
pub mod supervisor;

pub use config::{ProcessConfig, API_KEY_ENV_KEY, CREDENTIAL_ENV_KEY};
pub use error::ProcessError;
pub use health::{HealthProbe, HealthStatus, PidAliveProbe, PollProbe};
pub use state::ProcessState;
pub use supervisor::{ExitInfo, ProcessSupervisor, TransitionHandler};
