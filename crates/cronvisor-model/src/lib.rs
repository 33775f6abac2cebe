//! Domain types shared by the cronvisor crates.
//!
//! Nothing in here touches processes: these are the values the supervisor
//! consumes (`WorkItem`, `TimeLimits`) and produces (`RunReport`).

mod item;
pub use item::{Entry, EntryFn, ExecSpec, WorkItem};

mod limits;
pub use limits::{HARD_LIMIT_FACTOR, HardLimit, TimeLimits};

mod state;
pub use state::WorkerState;

mod report;
pub use report::{ItemReport, Outcome, RunReport, format_elapsed};

/// Name of a work item, unique within a run.
pub type JobName = String;
