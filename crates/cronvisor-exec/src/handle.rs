//! Lifecycle wrapper around one worker process.
//!
//! ```text
//! Created ──start──▶ Started ──stop──▶ Stopped ──status read──▶ Finished | Killed
//!    └──spawn error──▶ LaunchFailed
//! ```
//!
//! The handle keeps its own state instead of trusting the process object's liveness alone.
//! That is what lets the supervisor tell "never admitted", "still running" and "reclaimed" apart across polling ticks.
use std::{
    process::ExitStatus,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::process::Child;
use tracing::{debug, error, info, warn};

use cronvisor_model::{WorkItem, WorkerState, format_elapsed};

use crate::{
    error::{WorkerError, WorkerResult},
    launch::LaunchConfig,
    signal,
};

/// Annotation appended to the outcome message of forcibly terminated workers.
pub const KILLED_NOTE: &str = "(killed before finishing)";

pub struct WorkerHandle {
    item: WorkItem,
    launch: Arc<LaunchConfig>,
    state: WorkerState,
    child: Option<Child>,
    pid: Option<u32>,
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    exit_status: Option<ExitStatus>,
    killed: bool,
    launch_error: Option<String>,
}

impl WorkerHandle {
    pub fn new(item: WorkItem, launch: Arc<LaunchConfig>) -> Self {
        Self {
            item,
            launch,
            state: WorkerState::Created,
            child: None,
            pid: None,
            start_time: None,
            end_time: None,
            exit_status: None,
            killed: false,
            launch_error: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.item.name()
    }

    #[inline]
    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    #[inline]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[inline]
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// `true` between a successful `start` and the matching `stop`.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == WorkerState::Started
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state.is_stopped()
    }

    /// Launch the worker process.
    ///
    /// A spawn failure moves the handle to [`WorkerState::LaunchFailed`]; it is never retried.
    pub fn start(&mut self) -> WorkerResult<()> {
        if self.state != WorkerState::Created {
            return Err(WorkerError::AlreadyStarted(self.name().to_string()));
        }

        let spawned = self
            .launch
            .command(&self.item)
            .and_then(|mut cmd| cmd.spawn().map_err(WorkerError::from));

        match spawned {
            Ok(child) => {
                self.pid = child.id();
                self.child = Some(child);
                self.start_time = Some(Instant::now());
                self.state = WorkerState::Started;
                info!(
                    target: "cronvisor.exec",
                    worker = self.name(),
                    kind = self.item.entry().kind(),
                    pid = self.pid,
                    "worker started"
                );
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    WorkerError::Io(reason) => reason,
                    other => other.to_string(),
                };
                error!(target: "cronvisor.exec", worker = self.name(), %reason, "worker failed to launch");
                self.state = WorkerState::LaunchFailed;
                self.launch_error = Some(reason.clone());
                Err(WorkerError::Spawn {
                    name: self.name().to_string(),
                    reason,
                })
            }
        }
    }

    /// `true` once the OS assigned the worker a process id.
    #[inline]
    pub fn has_started(&self) -> bool {
        self.pid.is_some()
    }

    /// Non-blocking liveness check. Never changes the handle's state.
    pub fn poll_alive(&mut self) -> bool {
        if self.state != WorkerState::Started {
            return false;
        }
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                warn!(target: "cronvisor.exec", worker = self.item.name(), error = %e, "liveness check failed");
                false
            }
        }
    }

    /// Ask a running worker to exit without reclaiming it.
    ///
    /// Used to signal every overdue worker at once before each one is stopped.
    /// A signalled worker counts as killed; one that already exited is left alone.
    pub fn terminate(&mut self) -> WorkerResult<()> {
        if self.state != WorkerState::Started {
            return Err(WorkerError::NotStarted(self.name().to_string()));
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }
        signal::terminate(child, self.pid)?;
        self.killed = true;
        Ok(())
    }

    /// Reclaim the worker and record its end time.
    ///
    /// With `force`, a worker that is still alive is terminated, killed after the grace period and reaped; the handle is then marked as killed.
    /// A worker that already exited on its own is never marked as killed.
    /// Calling `stop` twice is a usage error, so run time is never accounted twice.
    pub async fn stop(&mut self, force: bool) -> WorkerResult<()> {
        let deadline = tokio::time::Instant::now() + self.launch.kill_grace;
        self.reclaim(force, deadline).await
    }

    /// Forced [`stop`](Self::stop) whose grace period ends at `deadline`.
    ///
    /// Lets several workers signalled together with [`terminate`](Self::terminate) share one grace period.
    /// A worker already signalled is not signalled again.
    pub async fn kill_by(&mut self, deadline: tokio::time::Instant) -> WorkerResult<()> {
        self.reclaim(true, deadline).await
    }

    async fn reclaim(&mut self, force: bool, deadline: tokio::time::Instant) -> WorkerResult<()> {
        match self.state {
            WorkerState::Started => {}
            WorkerState::Created | WorkerState::LaunchFailed => {
                return Err(WorkerError::NotStarted(self.name().to_string()));
            }
            WorkerState::Stopped | WorkerState::Finished | WorkerState::Killed => {
                return Err(WorkerError::AlreadyStopped(self.name().to_string()));
            }
        }

        self.end_time = Some(Instant::now());
        self.state = WorkerState::Stopped;

        let name = self.item.name();
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        let status = match child.try_wait() {
            Ok(Some(status)) => {
                if self.killed {
                    signal::sweep(self.pid);
                }
                Some(status)
            }
            Ok(None) if force => {
                warn!(target: "cronvisor.exec", worker = name, pid = self.pid, "killing worker");
                let signalled = self.killed;
                self.killed = true;
                match signal::shutdown(child, self.pid, deadline, signalled).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        error!(target: "cronvisor.exec", worker = name, error = %e, "failed to reap killed worker");
                        None
                    }
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(target: "cronvisor.exec", worker = name, error = %e, "failed to read exit status");
                None
            }
        };

        if let Some(status) = status {
            debug!(target: "cronvisor.exec", worker = name, %status, killed = self.killed, "worker reclaimed");
            self.exit_status = Some(status);
            self.child = None;
            self.state = if self.killed {
                WorkerState::Killed
            } else {
                WorkerState::Finished
            };
        }
        Ok(())
    }

    /// Run time of a stopped worker.
    pub fn elapsed(&self) -> WorkerResult<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Ok(end.saturating_duration_since(start)),
            (None, _) => Err(WorkerError::NotStarted(self.name().to_string())),
            (Some(_), None) => Err(WorkerError::NotStopped(self.name().to_string())),
        }
    }

    /// Human readable run time, annotated when the worker was killed.
    pub fn outcome_message(&self) -> String {
        match self.elapsed() {
            Ok(d) if self.killed => format!("{} {KILLED_NOTE}", format_elapsed(d)),
            Ok(d) => format_elapsed(d),
            Err(_) => match self.state {
                WorkerState::Created => "never ran".to_string(),
                WorkerState::LaunchFailed => "failed to launch".to_string(),
                _ => "still running".to_string(),
            },
        }
    }

    #[inline]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Exit code, `None` when the worker has no status or was ended by a signal.
    #[inline]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|s| s.code())
    }

    #[inline]
    pub fn killed(&self) -> bool {
        self.killed
    }

    /// `true` if the worker exited on its own with status zero.
    pub fn succeeded(&self) -> bool {
        self.state == WorkerState::Finished && self.exit_status.is_some_and(|s| s.success())
    }

    #[inline]
    pub fn launch_error(&self) -> Option<&str> {
        self.launch_error.as_deref()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.item.name())
            .field("state", &self.state)
            .field("pid", &self.pid)
            .field("killed", &self.killed)
            .finish()
    }
}
