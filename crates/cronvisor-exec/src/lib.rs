mod error;
pub use error::{WorkerError, WorkerResult};

pub mod handle;
pub use handle::WorkerHandle;

pub mod launch;
pub use launch::{LaunchConfig, WORKER_ENV};

pub mod limits;
pub use limits::RlimitConfig;

mod signal;

pub mod worker;
pub use worker::{dispatch, enter, run_entry};

pub mod prelude {
    pub use crate::error::{WorkerError, WorkerResult};
    pub use crate::{LaunchConfig, WorkerHandle, enter};
}
