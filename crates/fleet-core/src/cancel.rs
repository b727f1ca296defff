// SPDX-License-Identifier: MIT

//! A single cancellation token tree rooted at the pool (§5, §9).
//!
//! Derived tokens at session, task, wrapper, and retry-attempt granularity
//! all observe the root's cancellation. Do not rebuild tokens inside hot
//! loops — derive once per entity at creation time.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Thin wrapper over [`tokio_util::sync::CancellationToken`] that names the
/// two operations every long-running operation in the fleet needs:
/// deriving a child scope, and racing a deadline against cancellation.
#[derive(Debug, Clone)]
pub struct CancelScope {
    token: CancellationToken,
}

impl CancelScope {
    /// Create a new root scope. Cancelling it cancels every scope derived
    /// from it, transitively.
    pub fn root() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Derive a child scope. Cancelling the child never cancels the parent;
    /// cancelling the parent always cancels the child.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token() }
    }

    /// Derive a child scope that is automatically cancelled when `deadline`
    /// elapses, used for per-task/per-attempt deadlines (§3 TaskWrapper,
    /// §4.9.3 retry wall timeout).
    pub fn child_with_deadline(&self, deadline: Duration) -> Self {
        let scope = self.child();
        let inner = scope.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => inner.cancel(),
                _ = inner.cancelled() => {}
            }
        });
        scope
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Race `fut` against cancellation; `None` means cancellation won.
    pub async fn race<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            result = fut => Some(result),
            _ = self.token.cancelled() => None,
        }
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::root()
    }
}
