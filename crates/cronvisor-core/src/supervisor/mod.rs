//! Bounded-concurrency scheduling loop.
//!
//! The supervisor owns one [`WorkerHandle`] per item for the duration of a run.
//! Every tick it reclaims workers that exited, backfills freed slots in input order, and stops when all work settled or the hard deadline passed.
//! Workers still running at the deadline are signalled together and share a single kill grace period before they are killed.
pub mod admission;

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, instrument, warn};

use cronvisor_exec::{LaunchConfig, WorkerError, WorkerHandle};
use cronvisor_model::{RunReport, TimeLimits, WorkItem, WorkerState, format_elapsed};

use crate::{config::SupervisorConfig, error::CoreError, report};

pub struct Supervisor {
    cfg: SupervisorConfig,
    launch: Arc<LaunchConfig>,
}

impl Supervisor {
    pub fn new(cfg: SupervisorConfig) -> Self {
        let launch = Arc::new(cfg.launch.clone());
        Self { cfg, launch }
    }

    #[inline]
    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Run every item once under `limits`, with at most `max_concurrency` workers alive at a time.
    ///
    /// Returns the report according to the configured [`ReportMode`](crate::ReportMode).
    #[instrument(level = "debug", skip(self, items), fields(items = items.len(), label = ?self.cfg.label))]
    pub async fn run(
        &self,
        items: Vec<WorkItem>,
        limits: TimeLimits,
        max_concurrency: Option<usize>,
    ) -> Result<RunReport, CoreError> {
        ensure_unique(&items)?;

        let started = Instant::now();
        let mut handles: Vec<WorkerHandle> = items
            .into_iter()
            .map(|item| WorkerHandle::new(item, Arc::clone(&self.launch)))
            .collect();

        if !handles.is_empty() {
            self.drive(&mut handles, &limits, max_concurrency, started).await?;
        }

        let report = report::assemble(self.cfg.label.clone(), started.elapsed(), &handles, &limits);
        info!(
            target: "cronvisor.supervisor",
            elapsed = %format_elapsed(report.elapsed),
            settled = handles.iter().filter(|h| h.state().is_terminal()).count(),
            errors = report.errors.len(),
            "run finished"
        );
        report::deliver(report, self.cfg.mode)
    }

    async fn drive(
        &self,
        handles: &mut [WorkerHandle],
        limits: &TimeLimits,
        max_concurrency: Option<usize>,
        started: Instant,
    ) -> Result<(), CoreError> {
        let tick = self.cfg.tick.max(admission::MIN_TICK);
        let budget = admission::tick_budget(limits.hard_deadline(), tick);
        debug!(
            target: "cronvisor.supervisor",
            tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX),
            budget,
            max_concurrency,
            "scheduling loop starting"
        );

        admit(handles, max_concurrency)?;

        let mut ticks: u64 = 0;
        let mut soft_warned = false;
        loop {
            if admission::is_settled(max_concurrency, running(handles), pending(handles)) {
                debug!(target: "cronvisor.supervisor", ticks, "all work settled");
                break;
            }
            if budget.is_some_and(|b| ticks >= b) {
                warn!(target: "cronvisor.supervisor", ticks, "hard time limit reached");
                break;
            }

            tokio::time::sleep(tick).await;
            ticks += 1;

            reap(handles).await?;
            admit(handles, max_concurrency)?;

            if !soft_warned && started.elapsed() > limits.soft {
                soft_warned = true;
                warn!(
                    target: "cronvisor.supervisor",
                    soft = %format_elapsed(limits.soft),
                    running = running(handles),
                    "soft time limit exceeded"
                );
            }
        }

        kill_overdue(handles, self.launch.kill_grace).await
    }
}

fn ensure_unique(items: &[WorkItem]) -> Result<(), CoreError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.name()) {
            return Err(CoreError::DuplicateName(item.name().to_string()));
        }
    }
    Ok(())
}

fn running(handles: &[WorkerHandle]) -> usize {
    handles.iter().filter(|h| h.is_running()).count()
}

fn pending(handles: &[WorkerHandle]) -> usize {
    handles
        .iter()
        .filter(|h| h.state() == WorkerState::Created)
        .count()
}

/// Start pending workers in input order until the free slots are used up.
///
/// A worker that fails to launch does not consume a slot.
fn admit(handles: &mut [WorkerHandle], max_concurrency: Option<usize>) -> Result<(), CoreError> {
    let mut slots = admission::free_slots(max_concurrency, running(handles), pending(handles));
    for h in handles.iter_mut() {
        if slots == 0 {
            break;
        }
        if h.state() != WorkerState::Created {
            continue;
        }
        match h.start() {
            Ok(()) => slots -= 1,
            Err(e @ WorkerError::Spawn { .. }) => {
                warn!(target: "cronvisor.supervisor", error = %e, "worker not admitted");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Stop every started worker whose process already exited.
async fn reap(handles: &mut [WorkerHandle]) -> Result<(), CoreError> {
    for h in handles.iter_mut() {
        if h.is_running() && !h.poll_alive() {
            h.stop(false).await?;
            debug!(
                target: "cronvisor.supervisor",
                worker = h.name(),
                state = ?h.state(),
                code = h.exit_code(),
                "worker reclaimed"
            );
        }
    }
    Ok(())
}

/// Signal all workers still running, then kill whatever is left once `grace` has passed.
///
/// The grace period starts after the last signal and is shared by every overdue worker.
async fn kill_overdue(handles: &mut [WorkerHandle], grace: Duration) -> Result<(), CoreError> {
    let mut overdue = 0usize;
    for h in handles.iter_mut().filter(|h| h.is_running()) {
        overdue += 1;
        if let Err(e) = h.terminate() {
            warn!(target: "cronvisor.supervisor", worker = h.name(), error = %e, "terminate failed");
        }
    }
    if overdue > 0 {
        warn!(target: "cronvisor.supervisor", overdue, "stopping overdue workers");
    }

    let deadline = tokio::time::Instant::now() + grace;
    for h in handles.iter_mut().filter(|h| h.is_running()) {
        h.kill_by(deadline).await?;
    }
    Ok(())
}
