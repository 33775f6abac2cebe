//! Signal delivery to worker process groups.
//!
//! On Unix every worker leads its own process group, so signals reach anything the worker spawned.
use std::{io, process::ExitStatus};

use tokio::{process::Child, time::Instant};
use tracing::{debug, trace, warn};

#[cfg(unix)]
use nix::{
    errno::Errno,
    sys::signal::{Signal, killpg},
    unistd::Pid,
};

#[cfg(unix)]
fn group(pid: Option<u32>) -> Option<Pid> {
    pid.and_then(|p| i32::try_from(p).ok())
        .filter(|&p| p > 0)
        .map(Pid::from_raw)
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, sig: Signal) -> io::Result<()> {
    let Some(pgid) = group(pid) else {
        return Ok(());
    };
    match killpg(pgid, sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(io::Error::from(e)),
    }
}

/// Ask the worker and its descendants to exit with `SIGTERM`.
///
/// A group that is already gone is not an error.
#[cfg(unix)]
pub(crate) fn terminate(_child: &mut Child, pid: Option<u32>) -> io::Result<()> {
    signal_group(pid, Signal::SIGTERM)
}

/// No polite termination outside Unix: kill right away.
#[cfg(not(unix))]
pub(crate) fn terminate(child: &mut Child, _pid: Option<u32>) -> io::Result<()> {
    match child.start_kill() {
        Err(e) if e.kind() != io::ErrorKind::InvalidInput => Err(e),
        _ => Ok(()),
    }
}

/// `SIGKILL` whatever is left of the worker's process group.
pub(crate) fn sweep(pid: Option<u32>) {
    #[cfg(unix)]
    if let Err(e) = signal_group(pid, Signal::SIGKILL) {
        trace!(target: "cronvisor.exec.signal", error = %e, "group sweep failed");
    }
    #[cfg(not(unix))]
    let _ = pid;
}

/// Terminate the worker unless `signalled`, wait for it until `deadline`, then kill and reap it.
///
/// The remaining process group is killed in every case.
pub(crate) async fn shutdown(
    child: &mut Child,
    pid: Option<u32>,
    deadline: Instant,
    signalled: bool,
) -> io::Result<ExitStatus> {
    let graceful = signalled
        || match terminate(child, pid) {
            Ok(()) => true,
            Err(e) => {
                warn!(target: "cronvisor.exec.signal", error = %e, "terminate failed; escalating");
                false
            }
        };

    if graceful && let Ok(status) = tokio::time::timeout_at(deadline, child.wait()).await {
        sweep(pid);
        return status;
    }

    debug!(target: "cronvisor.exec.signal", pid, "kill grace exceeded; killing");
    sweep(pid);
    // Fails only when the child already exited, in which case `wait` returns the cached status.
    let _ = child.start_kill();
    child.wait().await
}
