pub mod config;
pub use config::{ReportMode, SupervisorConfig};

pub mod error;
pub use error::CoreError;

pub mod report;

pub mod supervisor;
pub use supervisor::Supervisor;
