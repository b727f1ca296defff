// SPDX-License-Identifier: MIT

//! Process supervisor (§4.1): owns a child process, enforces resource caps,
//! surfaces lifecycle events.

use crate::config::ProcessConfig;
use crate::error::ProcessError;
use crate::health::{HealthProbe, HealthStatus, PidAliveProbe};
use crate::state::ProcessState;
use fleet_core::ProcessId;
use fleet_metrics::MetricsRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tracing::{error, info, warn};

/// Poll interval used to observe process-exit from `wait`/`stop` (mirrors
/// the §4.8.3 backpressure `wait_for_space` 10ms poll).
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Exit information recorded once the child has terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
}

/// A transition handler a caller can register to observe every state
/// change (§4.1 "callers may attach user-visible handlers invoked on every
/// transition").
pub type TransitionHandler = Arc<dyn Fn(ProcessState, ProcessState) + Send + Sync>;

struct Inner {
    state: Mutex<ProcessState>,
    child: Mutex<Option<Child>>,
    pid: AtomicU32,
    start_time: Mutex<Option<Instant>>,
    last_health_time: Mutex<Option<Instant>>,
    exit_info: Mutex<Option<ExitInfo>>,
    handlers: Mutex<Vec<TransitionHandler>>,
}

/// Owns one child process and its lifecycle (§3 Process, §4.1).
///
/// `ProcessSupervisor` is the sole owner of the `Process`; a `Session`
/// observes it only through a `ProcessId` looked up in a registry (§9
/// weak-reference redesign) rather than holding a pointer into this struct.
pub struct ProcessSupervisor {
    pub id: ProcessId,
    config: ProcessConfig,
    probe: Arc<dyn HealthProbe>,
    metrics: Arc<MetricsRegistry>,
    inner: Arc<Inner>,
}

impl ProcessSupervisor {
    pub fn new(config: ProcessConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_probe(config, metrics, Arc::new(PidAliveProbe))
    }

    pub fn with_probe(
        config: ProcessConfig,
        metrics: Arc<MetricsRegistry>,
        probe: Arc<dyn HealthProbe>,
    ) -> Self {
        Self {
            id: ProcessId::new(),
            config,
            probe,
            metrics,
            inner: Arc::new(Inner {
                state: Mutex::new(ProcessState::Created),
                child: Mutex::new(None),
                pid: AtomicU32::new(0),
                start_time: Mutex::new(None),
                last_health_time: Mutex::new(None),
                exit_info: Mutex::new(None),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a handler invoked on every state transition.
    pub fn on_transition(&self, handler: TransitionHandler) {
        self.inner.handlers.lock().push(handler);
    }

    fn transition(&self, to: ProcessState) -> Result<(), ProcessError> {
        let from = {
            let mut state = self.inner.state.lock();
            let from = *state;
            if !from.can_transition_to(to) {
                return Err(ProcessError::InvalidTransition { from, to });
            }
            *state = to;
            from
        };
        for handler in self.inner.handlers.lock().iter() {
            handler(from, to);
        }
        info!(process_id = %self.id, from = %from, to = %to, "process state transition");
        Ok(())
    }

    /// Force a transition to `Error`, bypassing the normal adjacency check
    /// (§4.1 "any state -> Error on unrecoverable failure").
    fn force_error(&self, reason: &str) {
        let from = {
            let mut state = self.inner.state.lock();
            let from = *state;
            *state = ProcessState::Error;
            from
        };
        if from != ProcessState::Error {
            for handler in self.inner.handlers.lock().iter() {
                handler(from, ProcessState::Error);
            }
        }
        warn!(process_id = %self.id, reason, "process entered error state");
    }

    pub fn status(&self) -> ProcessState {
        *self.inner.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.status() == ProcessState::Running
    }

    pub fn pid(&self) -> Option<u32> {
        let pid = self.inner.pid.load(Ordering::Relaxed);
        (pid != 0).then_some(pid)
    }

    /// Start the child process (§4.1 `start`).
    pub async fn start(&self) -> Result<(), ProcessError> {
        if matches!(self.status(), ProcessState::Running | ProcessState::Starting) {
            return Err(ProcessError::AlreadyRunning);
        }
        self.config.validate()?;
        self.transition(ProcessState::Starting)?;

        let mut cmd = tokio::process::Command::new(&self.config.command);
        cmd.args(&self.config.args);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        for (k, v) in self.config.effective_env() {
            cmd.env(k, v);
        }
        cmd.stdin(std::process::Stdio::piped());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.force_error("spawn failed");
                return Err(ProcessError::SpawnFailed(e));
            }
        };
        let pid = child.id().unwrap_or(0);
        self.inner.pid.store(pid, Ordering::Relaxed);
        *self.inner.start_time.lock() = Some(Instant::now());
        *self.inner.child.lock() = Some(child);

        let health = self.probe.probe(pid).await;
        if !health.is_ok() {
            self.force_error("failed first liveness probe");
            return Err(ProcessError::HealthCheckFailed(match health {
                HealthStatus::Failed(msg) => msg,
                HealthStatus::Ok => unreachable!(),
            }));
        }
        *self.inner.last_health_time.lock() = Some(Instant::now());
        self.transition(ProcessState::Running)?;
        self.metrics.counter("process_started_total").incr();
        self.spawn_reaper();
        Ok(())
    }

    /// Spawn the sole task that owns and waits on the child (§4.1 failure
    /// semantics: transitions to `Stopped` on a clean/requested exit, `Error`
    /// otherwise). This is the only place `wait()` is ever called on the
    /// child, so termination (`stop`/`kill`) signals the OS process by pid
    /// directly instead of contending for ownership of the `Child` handle.
    fn spawn_reaper(&self) {
        let inner = self.inner.clone();
        let id = self.id;
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            let mut child = match inner.child.lock().take() {
                Some(c) => c,
                None => return,
            };
            let wait_result = child.wait().await;
            let was_driven_externally =
                matches!(*inner.state.lock(), ProcessState::Stopped);
            if was_driven_externally {
                return;
            }
            match wait_result {
                Ok(status) => {
                    let code = status.code();
                    *inner.exit_info.lock() = Some(ExitInfo { code });
                    let was_stopping = matches!(*inner.state.lock(), ProcessState::Stopping);
                    let to = if was_stopping || code == Some(0) {
                        ProcessState::Stopped
                    } else {
                        ProcessState::Error
                    };
                    let from = {
                        let mut state = inner.state.lock();
                        let from = *state;
                        *state = to;
                        from
                    };
                    for handler in inner.handlers.lock().iter() {
                        handler(from, to);
                    }
                    if to == ProcessState::Error {
                        error!(process_id = %id, exit_code = ?code, "child exited unexpectedly");
                        metrics.counter("process_crashed_total").incr();
                    }
                }
                Err(e) => {
                    error!(process_id = %id, error = %e, "failed to wait on child");
                    *inner.state.lock() = ProcessState::Error;
                }
            }
        });
    }

    /// Stop gracefully, escalating to a forced kill after `timeout` (§4.1
    /// `stop`).
    pub async fn stop(&self, timeout: Duration) -> Result<(), ProcessError> {
        if self.status() == ProcessState::Stopped {
            return Ok(());
        }
        self.transition(ProcessState::Stopping)?;
        self.send_signal(Signal::Term);

        if !self.poll_until_terminal(timeout).await {
            warn!(process_id = %self.id, "graceful stop timed out, escalating to kill");
            self.send_signal(Signal::Kill);
            self.poll_until_terminal(Duration::from_secs(5)).await;
        }
        if self.status() == ProcessState::Stopping {
            let _ = self.transition(ProcessState::Stopped);
        }
        Ok(())
    }

    /// Unconditional force-terminate; idempotent if already `Stopped` (§4.1
    /// `kill`, §8 idempotence property 4).
    pub async fn kill(&self) -> Result<(), ProcessError> {
        if self.status() == ProcessState::Stopped {
            return Ok(());
        }
        self.send_signal(Signal::Kill);
        self.poll_until_terminal(Duration::from_secs(5)).await;
        if self.status() != ProcessState::Stopped {
            let _ = self.transition(ProcessState::Stopped);
        }
        Ok(())
    }

    /// Poll `status()` until it reaches a terminal state or `bound` elapses.
    /// Returns whether a terminal state was observed in time.
    async fn poll_until_terminal(&self, bound: Duration) -> bool {
        let deadline = Instant::now() + bound;
        loop {
            if matches!(self.status(), ProcessState::Stopped | ProcessState::Error) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn send_signal(&self, signal: Signal) {
        let Some(pid) = self.pid() else { return };
        #[cfg(unix)]
        {
            use nix::sys::signal::kill;
            use nix::unistd::Pid;
            let sig = match signal {
                Signal::Term => nix::sys::signal::Signal::SIGTERM,
                Signal::Kill => nix::sys::signal::Signal::SIGKILL,
            };
            if let Err(e) = kill(Pid::from_raw(pid as i32), sig) {
                warn!(process_id = %self.id, error = %e, "failed to deliver signal");
            }
        }
        #[cfg(not(unix))]
        {
            let _ = (pid, signal);
        }
    }

    /// Cheap probe: child alive + optional ping (§4.1 `health_check`).
    pub async fn health_check(&self) -> HealthStatus {
        let Some(pid) = self.pid() else {
            return HealthStatus::Failed("process has no pid".to_string());
        };
        let status = self.probe.probe(pid).await;
        *self.inner.last_health_time.lock() = Some(Instant::now());
        status
    }

    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.inner.exit_info.lock()
    }

    /// Wait until the process exits, however that happens.
    pub async fn wait(&self) {
        loop {
            if matches!(self.status(), ProcessState::Stopped | ProcessState::Error) {
                return;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
