// SPDX-License-Identifier: MIT

//! Session manager and pool errors.

use crate::state::SessionState;
use fleet_core::{ConfigError, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("invalid transition ({from}, {to})")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("failed to provision backing process: {0}")]
    ProvisionFailed(String),

    #[error("session {0} already closed")]
    AlreadyClosed(SessionId),
}
