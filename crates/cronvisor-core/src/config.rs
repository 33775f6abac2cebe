use std::time::Duration;

use cronvisor_exec::LaunchConfig;

/// Polling interval of the scheduling loop.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// What the supervisor does with the assembled report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportMode {
    /// Hand the report back to the caller; a failed run becomes [`CoreError::RunFailed`](crate::CoreError::RunFailed).
    #[default]
    Return,
    /// Print the summary to stdout, or the failure text to stderr and exit the process with status 1.
    Exit,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub tick: Duration,
    pub mode: ReportMode,
    pub launch: LaunchConfig,
    /// Run label shown in the report, usually the job group name.
    pub label: Option<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            mode: ReportMode::default(),
            launch: LaunchConfig::default(),
            label: None,
        }
    }
}

impl SupervisorConfig {
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_mode(mut self, mode: ReportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_launch(mut self, launch: LaunchConfig) -> Self {
        self.launch = launch;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
