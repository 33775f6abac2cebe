use std::path::PathBuf;

use clap::Parser;

use cronvisor_observe::LoggerFormat;

use crate::config::Overrides;

/// Run one group of batch jobs under a shared time window.
#[derive(Parser, Debug)]
#[command(name = "cronvisor", author, version, about, long_about = None)]
pub struct Cli {
    /// Job group to run, e.g. `hourly`
    #[arg(value_name = "GROUP")]
    pub group: String,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", default_value = "cronvisor.yaml")]
    pub config: PathBuf,

    /// Soft time limit in seconds, overriding the group's
    #[arg(long, value_name = "SECS")]
    pub time_limit: Option<u64>,

    /// Kill deadline in seconds (default: four times the soft limit)
    #[arg(long, value_name = "SECS", conflicts_with = "no_hard_limit")]
    pub hard_limit: Option<u64>,

    /// Never kill workers; wait for all of them to finish
    #[arg(long)]
    pub no_hard_limit: bool,

    /// Maximum number of workers running at once
    #[arg(long, value_name = "N")]
    pub max_concurrency: Option<usize>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: text, json or journald
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            time_limit_secs: self.time_limit,
            hard_limit_secs: self.hard_limit,
            unbounded: self.no_hard_limit,
            max_concurrency: self.max_concurrency,
        }
    }
}
