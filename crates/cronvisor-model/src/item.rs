use std::{collections::BTreeMap, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::JobName;

/// Zero-argument entry procedure of a work item.
///
/// Failure is signalled by returning an error; the worker process then exits non-zero.
pub type EntryFn = fn() -> anyhow::Result<()>;

/// What a worker process executes.
#[derive(Clone)]
pub enum Entry {
    /// Run a function compiled into the current program.
    ///
    /// The worker is a re-executed copy of the current binary which dispatches to this function by item name.
    Function(EntryFn),
    /// Run an external program on the host.
    Exec(ExecSpec),
}

impl Entry {
    /// Returns a short symbolic identifier for the entry kind:
    /// - `"fn"`
    /// - `"exec"`
    pub fn kind(&self) -> &'static str {
        match self {
            Entry::Function(_) => "fn",
            Entry::Exec(_) => "exec",
        }
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Function(_) => f.write_str("Function(..)"),
            Entry::Exec(spec) => f.debug_tuple("Exec").field(spec).finish(),
        }
    }
}

/// External command executed as a worker.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecSpec {
    /// Command to execute (e.g., `"ls"`, `"/usr/bin/python"`).
    pub command: String,
    /// Command-line arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment variables for the process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    ///
    /// If `None`, the process inherits the working directory of the supervisor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

impl ExecSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// A named unit of work executed once per run.
#[derive(Clone, Debug)]
pub struct WorkItem {
    name: JobName,
    entry: Entry,
}

impl WorkItem {
    pub fn new(name: impl Into<JobName>, entry: Entry) -> Self {
        Self {
            name: name.into(),
            entry,
        }
    }

    /// Item backed by an in-binary function.
    pub fn function(name: impl Into<JobName>, f: EntryFn) -> Self {
        Self::new(name, Entry::Function(f))
    }

    /// Item backed by an external command.
    pub fn exec(name: impl Into<JobName>, spec: ExecSpec) -> Self {
        Self::new(name, Entry::Exec(spec))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn entry(&self) -> &Entry {
        &self.entry
    }
}
