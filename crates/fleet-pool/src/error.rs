// SPDX-License-Identifier: MIT

//! Pool errors.

use fleet_core::SessionId;
use fleet_session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool full")]
    PoolFull,

    #[error("system load exceeds the acquisition rejection threshold")]
    SystemOverloaded,

    #[error("pooled session {0} not found")]
    NotFound(SessionId),

    #[error(transparent)]
    Session(#[from] SessionError),
}
