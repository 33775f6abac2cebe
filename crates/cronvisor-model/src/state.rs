use serde::{Deserialize, Serialize};

/// Lifecycle state of a worker handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerState {
    /// Handle exists, process was never admitted.
    Created,
    /// Process launched and not yet reclaimed.
    Started,
    /// Reclaimed, but no exit status could be read.
    Stopped,
    /// Process exited on its own and its status was read.
    Finished,
    /// Process was forcibly terminated.
    Killed,
    /// The OS refused to launch the process.
    LaunchFailed,
}

impl WorkerState {
    /// Returns `true` if the handle won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerState::Stopped
                | WorkerState::Finished
                | WorkerState::Killed
                | WorkerState::LaunchFailed
        )
    }

    /// Returns `true` once `stop` has been applied to the handle.
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            WorkerState::Stopped | WorkerState::Finished | WorkerState::Killed
        )
    }
}
