use thiserror::Error;

use cronvisor_exec::WorkerError;
use cronvisor_model::RunReport;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("duplicate work item name: {0}")]
    DuplicateName(String),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    /// The run completed with errors; `message` is the rendered failure text.
    #[error("{message}")]
    RunFailed {
        message: String,
        report: Box<RunReport>,
    },
}

impl CoreError {
    /// Report of a completed run, if this error carries one.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            CoreError::RunFailed { report, .. } => Some(report),
            _ => None,
        }
    }
}
