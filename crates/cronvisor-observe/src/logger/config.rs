use std::io::IsTerminal;

use crate::logger::format::LoggerFormat;

/// Environment variable overriding the configured level filter.
pub const LOG_ENV: &str = "CRONVISOR_LOG";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `cronvisor=debug,warn`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stderr().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
        }
    }
}

impl LoggerConfig {
    /// Level directive in effect: `CRONVISOR_LOG` when set and non-empty, else `level`.
    pub fn effective_level(&self) -> String {
        match std::env::var(LOG_ENV) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => self.level.clone(),
        }
    }
}
