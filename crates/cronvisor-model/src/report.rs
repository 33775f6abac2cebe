use std::{fmt::Write as _, time::Duration};

use serde::{Deserialize, Serialize};

use crate::JobName;

/// Final classification of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Outcome {
    /// Exited with status zero.
    Succeeded,
    /// Exited non-zero; `code` is `None` when terminated by a signal.
    Failed { code: Option<i32> },
    /// Forcibly terminated at the hard deadline.
    Killed,
    /// Never admitted before the run ended.
    NeverRan,
    /// The process could not be spawned.
    LaunchFailed,
    /// Reclaimed without an observable exit status.
    Unreaped,
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// Per-item line of a run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReport {
    pub name: JobName,
    pub outcome: Outcome,
    /// Human readable timing/outcome text.
    pub message: String,
}

/// Aggregated result of one supervised run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Job group the run was started for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Wall clock from loop entry until the report was assembled.
    #[serde(with = "secs_serde")]
    pub elapsed: Duration,
    /// Items in input order.
    pub items: Vec<ItemReport>,
    /// One line per failing, killed or never-started item, plus overrun lines.
    pub errors: Vec<String>,
    pub had_errors: bool,
}

impl RunReport {
    pub fn new(label: Option<String>, elapsed: Duration) -> Self {
        Self {
            label,
            elapsed,
            items: Vec::new(),
            errors: Vec::new(),
            had_errors: false,
        }
    }

    pub fn push_item(&mut self, name: impl Into<JobName>, outcome: Outcome, message: impl Into<String>) {
        self.items.push(ItemReport {
            name: name.into(),
            outcome,
            message: message.into(),
        });
    }

    pub fn push_error(&mut self, line: impl Into<String>) {
        self.errors.push(line.into());
        self.had_errors = true;
    }

    /// Look up the item line for `name`.
    pub fn item(&self, name: &str) -> Option<&ItemReport> {
        self.items.iter().find(|i| i.name == name)
    }

    /// Success summary: total elapsed time followed by per-item timing.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        match &self.label {
            Some(label) => {
                let _ = writeln!(out, "{label} completed in {}", format_elapsed(self.elapsed));
            }
            None => {
                let _ = writeln!(out, "run completed in {}", format_elapsed(self.elapsed));
            }
        }
        self.write_items(&mut out);
        out
    }

    /// Failure text: error lines first, then per-item timing.
    pub fn failure_text(&self) -> String {
        let mut out = String::new();
        match &self.label {
            Some(label) => {
                let _ = writeln!(out, "{label} finished with {} error(s):", self.errors.len());
            }
            None => {
                let _ = writeln!(out, "run finished with {} error(s):", self.errors.len());
            }
        }
        for line in &self.errors {
            let _ = writeln!(out, "  - {line}");
        }
        let _ = writeln!(out, "total time: {}", format_elapsed(self.elapsed));
        self.write_items(&mut out);
        out
    }

    fn write_items(&self, out: &mut String) {
        for item in &self.items {
            let _ = writeln!(out, "  {}: {}", item.name, item.message);
        }
    }
}

/// Render a duration as `H:MM:SS.mmm`.
pub fn format_elapsed(d: Duration) -> String {
    let total = d.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    format!("{hours}:{minutes:02}:{seconds:02}.{:03}", d.subsec_millis())
}

mod secs_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        d.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
