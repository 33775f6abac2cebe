//! Report assembly and delivery.
use std::time::Duration;

use tracing::{debug, error};

use cronvisor_exec::WorkerHandle;
use cronvisor_model::{Outcome, RunReport, TimeLimits, WorkerState, format_elapsed};

use crate::{config::ReportMode, error::CoreError};

/// Marker contained in the synthetic overrun line.
pub const OVER_TIME_LIMIT: &str = "over time limit";

/// Build the report of a finished run from its handles, in input order.
pub fn assemble(
    label: Option<String>,
    elapsed: Duration,
    handles: &[WorkerHandle],
    limits: &TimeLimits,
) -> RunReport {
    let mut report = RunReport::new(label, elapsed);

    for h in handles {
        let name = h.name();
        let message = h.outcome_message();
        let (outcome, line) = match h.state() {
            WorkerState::Finished if h.succeeded() => (Outcome::Succeeded, None),
            WorkerState::Finished => {
                let line = match h.exit_status() {
                    Some(status) => format!("{name} failed ({status})"),
                    None => format!("{name} failed"),
                };
                (Outcome::Failed { code: h.exit_code() }, Some(line))
            }
            WorkerState::Killed => (
                Outcome::Killed,
                Some(format!("{name} was killed after running {message}")),
            ),
            WorkerState::Created => (Outcome::NeverRan, Some(format!("{name} never ran"))),
            WorkerState::LaunchFailed => {
                let reason = h.launch_error().unwrap_or("unknown error");
                (
                    Outcome::LaunchFailed,
                    Some(format!("{name} failed to launch: {reason}")),
                )
            }
            WorkerState::Stopped if h.killed() => (
                Outcome::Killed,
                Some(format!("{name} was killed after running {message}")),
            ),
            WorkerState::Stopped | WorkerState::Started => (
                Outcome::Unreaped,
                Some(format!("{name} stopped without an exit status")),
            ),
        };

        report.push_item(name, outcome, message);
        if let Some(line) = line {
            report.push_error(line);
        }
    }

    if let Some(line) = overrun_line(elapsed, limits) {
        report.push_error(line);
    }
    report
}

/// Synthetic line for a run that outlived its limits: names the hard limit when it was crossed, the soft one otherwise.
fn overrun_line(elapsed: Duration, limits: &TimeLimits) -> Option<String> {
    let (kind, limit) = match limits.hard_deadline() {
        Some(hard) if elapsed > hard => ("hard", hard),
        _ if elapsed > limits.soft => ("soft", limits.soft),
        _ => return None,
    };
    Some(format!(
        "run {OVER_TIME_LIMIT}: took {}, {kind} limit is {}",
        format_elapsed(elapsed),
        format_elapsed(limit)
    ))
}

/// Hand the report over according to `mode`.
///
/// In [`ReportMode::Exit`] a failed run terminates the process with status 1.
pub fn deliver(report: RunReport, mode: ReportMode) -> Result<RunReport, CoreError> {
    match (mode, report.had_errors) {
        (ReportMode::Return, false) => Ok(report),
        (ReportMode::Return, true) => Err(CoreError::RunFailed {
            message: report.failure_text(),
            report: Box::new(report),
        }),
        (ReportMode::Exit, false) => {
            debug!(target: "cronvisor.report", "writing summary");
            print!("{}", report.summary());
            Ok(report)
        }
        (ReportMode::Exit, true) => {
            error!(target: "cronvisor.report", errors = report.errors.len(), "run failed");
            eprint!("{}", report.failure_text());
            std::process::exit(1);
        }
    }
}
