// SPDX-License-Identifier: MIT

//! Pluggable liveness/health probe (§4.1 `health_check`).
//!
//! Generalizes the teacher's HTTP poll against a sidecar's `/health` route
//! (`coop/spawn.rs::wait_for_ready`) into "ping is any async check"; the
//! concrete wire protocol to the child's health surface is a collaborator's
//! concern (§1 out-of-scope: "the actual wire protocol of the child process
//! beyond newline-framed JSON").

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

type BoxedPing = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Ok,
    Failed(String),
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

/// A cheap liveness probe: child alive plus an optional ping.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self, pid: u32) -> HealthStatus;
}

/// Probe that only checks the OS reports the PID alive (no application-level
/// ping). Suitable when the child exposes no health surface of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidAliveProbe;

#[async_trait]
impl HealthProbe for PidAliveProbe {
    async fn probe(&self, pid: u32) -> HealthStatus {
        if pid_is_alive(pid) {
            HealthStatus::Ok
        } else {
            HealthStatus::Failed(format!("pid {pid} not found"))
        }
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    true
}

/// Probe that polls an async closure with a timeout (mirrors the teacher's
/// `wait_for_ready` HTTP poll, generalized over the ping mechanism).
pub struct PollProbe<F> {
    pub ping: F,
    pub timeout: Duration,
}

#[async_trait]
impl<F> HealthProbe for PollProbe<F>
where
    F: Fn() -> BoxedPing + Send + Sync,
{
    async fn probe(&self, _pid: u32) -> HealthStatus {
        match tokio::time::timeout(self.timeout, (self.ping)()).await {
            Ok(Ok(())) => HealthStatus::Ok,
            Ok(Err(e)) => HealthStatus::Failed(e),
            Err(_) => HealthStatus::Failed("health probe timed out".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pid_alive_probe_reports_ok_for_current_process() {
        let probe = PidAliveProbe;
        let status = probe.probe(std::process::id()).await;
        assert_eq!(status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn pid_alive_probe_reports_failed_for_unlikely_pid() {
        let probe = PidAliveProbe;
        let status = probe.probe(u32::MAX - 1).await;
        assert!(!status.is_ok());
    }
}
