//! Logging setup shared by cronvisor binaries.
//!
//! All output goes to stderr; stdout is reserved for run reports.
mod logger;
pub use logger::*;
