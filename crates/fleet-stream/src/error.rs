// SPDX-License-Identifier: MIT

//! Stream multiplexer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("item dropped: backpressure handler is full")]
    Dropped,

    #[error("line exceeds the maximum line size")]
    LineTooLarge,

    #[error("handler timed out")]
    HandlerTimeout,

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("handler failed: {0}")]
    HandlerFailed(String),
}
