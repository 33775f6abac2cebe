use std::{ffi::OsString, path::PathBuf, process::Stdio, time::Duration};

use tokio::process::Command;
use tracing::trace;

use cronvisor_model::{Entry, WorkItem};

use crate::{
    error::{WorkerError, WorkerResult},
    limits::RlimitConfig,
};

/// Environment variable naming the item a re-executed worker must run.
pub const WORKER_ENV: &str = "CRONVISOR_WORKER";

/// Default time a terminated worker gets to exit before it is killed.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// How worker processes are spawned.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Program re-executed for function entries; `None` uses the current executable.
    pub program: Option<PathBuf>,
    /// Arguments for function workers; `None` repeats the supervisor's own arguments.
    pub args: Option<Vec<OsString>>,
    /// Extra environment applied to every worker.
    pub env: Vec<(String, String)>,
    pub rlimits: RlimitConfig,
    /// Time between `SIGTERM` and `SIGKILL` on forced stops.
    pub kill_grace: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: None,
            env: Vec::new(),
            rlimits: RlimitConfig::default(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }
}

impl LaunchConfig {
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    pub fn with_rlimits(mut self, rlimits: RlimitConfig) -> Self {
        self.rlimits = rlimits;
        self
    }

    /// Build the command that runs `item` in its own process.
    pub fn command(&self, item: &WorkItem) -> WorkerResult<Command> {
        let mut cmd = match item.entry() {
            Entry::Function(_) => {
                let program = match &self.program {
                    Some(p) => p.clone(),
                    None => std::env::current_exe()?,
                };
                let args: Vec<OsString> = match &self.args {
                    Some(a) => a.clone(),
                    None => std::env::args_os().skip(1).collect(),
                };

                trace!(target: "cronvisor.exec.launch", worker = item.name(), program = %program.display(), "re-exec");
                let mut cmd = Command::new(program);
                cmd.args(args).env(WORKER_ENV, item.name());
                cmd
            }
            Entry::Exec(spec) => {
                if spec.command.trim().is_empty() {
                    return Err(WorkerError::MissingProgram(item.name().to_string()));
                }

                trace!(target: "cronvisor.exec.launch", worker = item.name(), program = %spec.command, args = ?spec.args, "exec");
                let mut cmd = Command::new(&spec.command);
                cmd.args(&spec.args).envs(&spec.env);
                if let Some(cwd) = &spec.cwd {
                    cmd.current_dir(cwd);
                }
                cmd
            }
        };

        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // Own process group, so a forced stop reaches the worker's descendants.
        #[cfg(unix)]
        cmd.process_group(0);
        self.rlimits.attach(&mut cmd);

        Ok(cmd)
    }
}
