use thiserror::Error;

/// Errors raised by a [`WorkerHandle`](crate::WorkerHandle).
///
/// Everything except [`WorkerError::Spawn`] signals misuse of the handle and must abort the run.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker '{0}' was already started")]
    AlreadyStarted(String),
    #[error("worker '{0}' was never started")]
    NotStarted(String),
    #[error("worker '{0}' was already stopped")]
    AlreadyStopped(String),
    #[error("worker '{0}' has not been stopped yet")]
    NotStopped(String),
    #[error("missing program for worker '{0}'")]
    MissingProgram(String),
    #[error("spawn failed for worker '{name}': {reason}")]
    Spawn { name: String, reason: String },
    #[error("io error: {0}")]
    Io(String),
}

impl WorkerError {
    /// Returns `true` for errors caused by calling the handle out of order.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            WorkerError::AlreadyStarted(_)
                | WorkerError::NotStarted(_)
                | WorkerError::AlreadyStopped(_)
                | WorkerError::NotStopped(_)
        )
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        WorkerError::Io(e.to_string())
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;
