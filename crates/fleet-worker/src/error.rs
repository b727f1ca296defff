// SPDX-License-Identifier: MIT

//! Worker pool errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("queue full")]
    QueueFull,

    #[error("task cancelled before completion")]
    Cancelled,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task failed: {0}")]
    Failed(String),
}
