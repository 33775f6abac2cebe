//! Job group configuration.
//!
//! ```yaml
//! kill_grace_secs: 5
//! rlimits:
//!   disable_core_dumps: true
//! groups:
//!   hourly:
//!     max_concurrency: 4
//!     jobs:
//!       - name: rotate-logs
//!         command: /usr/local/bin/rotate
//!         args: ["--keep", "7"]
//! ```
//!
//! A group named after a schedule profile inherits that profile's soft limit.
use std::{
    collections::BTreeMap,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use cronvisor_exec::{LaunchConfig, RlimitConfig};
use cronvisor_model::{ExecSpec, TimeLimits, WorkItem};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unknown job group: {0}")]
    UnknownGroup(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Built-in schedules and their default soft limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    FiveMinutes,
    Hourly,
    FourHourly,
    Daily,
    Weekly,
}

impl Profile {
    pub const ALL: [Profile; 5] = [
        Profile::FiveMinutes,
        Profile::Hourly,
        Profile::FourHourly,
        Profile::Daily,
        Profile::Weekly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::FiveMinutes => "five_minutes",
            Profile::Hourly => "hourly",
            Profile::FourHourly => "four_hourly",
            Profile::Daily => "daily",
            Profile::Weekly => "weekly",
        }
    }

    pub fn soft_limit(&self) -> Duration {
        let secs = match self {
            Profile::FiveMinutes => 180,
            Profile::Hourly => 3_600,
            Profile::FourHourly => 5_400,
            Profile::Daily => 43_200,
            Profile::Weekly => 86_400,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ConfigError::UnknownGroup(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_open_files: Option<u64>,
    pub max_file_size_bytes: Option<u64>,
    #[serde(default)]
    pub disable_core_dumps: bool,
}

impl From<&LimitsConfig> for RlimitConfig {
    fn from(c: &LimitsConfig) -> Self {
        RlimitConfig {
            max_open_files: c.max_open_files,
            max_file_size_bytes: c.max_file_size_bytes,
            disable_core_dumps: c.disable_core_dumps,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(flatten)]
    pub exec: ExecSpec,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Soft limit; defaults to the profile of the same name.
    pub time_limit_secs: Option<u64>,
    pub hard_limit_secs: Option<u64>,
    #[serde(default)]
    pub unbounded: bool,
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub kill_grace_secs: Option<u64>,
    #[serde(default)]
    pub rlimits: LimitsConfig,
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub time_limit_secs: Option<u64>,
    pub hard_limit_secs: Option<u64>,
    pub unbounded: bool,
    pub max_concurrency: Option<usize>,
}

/// Everything needed to run one group.
#[derive(Debug)]
pub struct GroupPlan {
    pub name: String,
    pub limits: TimeLimits,
    pub max_concurrency: Option<usize>,
    pub items: Vec<WorkItem>,
    pub launch: LaunchConfig,
}

pub fn load(path: &Path) -> ConfigResult<FileConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::parse(&content)
}

impl FileConfig {
    pub fn parse(content: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve `group` into a runnable plan.
    pub fn plan(&self, group: &str, overrides: &Overrides) -> ConfigResult<GroupPlan> {
        let cfg = self
            .groups
            .get(group)
            .ok_or_else(|| ConfigError::UnknownGroup(group.to_string()))?;

        let soft = match overrides.time_limit_secs.or(cfg.time_limit_secs) {
            Some(secs) => Duration::from_secs(secs),
            None => group.parse::<Profile>().map(|p| p.soft_limit()).map_err(|_| {
                ConfigError::Invalid(format!(
                    "group '{group}' has no time_limit_secs and is not a schedule profile"
                ))
            })?,
        };

        let limits = if overrides.unbounded {
            TimeLimits::new(soft).unbounded()
        } else if let Some(secs) = overrides.hard_limit_secs {
            TimeLimits::new(soft).with_hard(Duration::from_secs(secs))
        } else {
            match (cfg.hard_limit_secs, cfg.unbounded) {
                (Some(_), true) => {
                    return Err(ConfigError::Invalid(format!(
                        "group '{group}' sets both hard_limit_secs and unbounded"
                    )));
                }
                (Some(secs), false) => TimeLimits::new(soft).with_hard(Duration::from_secs(secs)),
                (None, true) => TimeLimits::new(soft).unbounded(),
                (None, false) => TimeLimits::new(soft),
            }
        };

        let items = cfg
            .jobs
            .iter()
            .map(|job| WorkItem::exec(job.name.clone(), job.exec.clone()))
            .collect();

        let mut launch = LaunchConfig::default().with_rlimits(RlimitConfig::from(&self.rlimits));
        if let Some(secs) = self.kill_grace_secs {
            launch = launch.with_kill_grace(Duration::from_secs(secs));
        }

        Ok(GroupPlan {
            name: group.to_string(),
            limits,
            max_concurrency: overrides.max_concurrency.or(cfg.max_concurrency),
            items,
            launch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronvisor_model::{Entry, HardLimit};
    use std::io::Write;

    const SAMPLE: &str = r#"
kill_grace_secs: 2
rlimits:
  max_open_files: 256
groups:
  hourly:
    max_concurrency: 2
    jobs:
      - name: rotate
        command: /usr/bin/true
      - name: report
        command: sh
        args: ["-c", "exit 0"]
        env:
          MODE: fast
  adhoc:
    time_limit_secs: 30
    unbounded: true
    jobs: []
  broken:
    hard_limit_secs: 10
    unbounded: true
"#;

    fn sample() -> FileConfig {
        FileConfig::parse(SAMPLE).unwrap()
    }

    #[test]
    fn profile_names_and_limits() {
        assert_eq!("four_hourly".parse::<Profile>().unwrap(), Profile::FourHourly);
        assert_eq!(Profile::FiveMinutes.soft_limit(), Duration::from_secs(180));
        assert_eq!(Profile::Weekly.to_string(), "weekly");
        assert!("monthly".parse::<Profile>().is_err());
    }

    #[test]
    fn profile_group_inherits_soft_limit() {
        let plan = sample().plan("hourly", &Overrides::default()).unwrap();

        assert_eq!(plan.limits.soft, Duration::from_secs(3_600));
        assert_eq!(plan.limits.hard, HardLimit::Default);
        assert_eq!(plan.max_concurrency, Some(2));
        assert_eq!(plan.launch.kill_grace, Duration::from_secs(2));
        assert_eq!(plan.launch.rlimits.max_open_files, Some(256));

        let names: Vec<_> = plan.items.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["rotate", "report"]);
        match plan.items[1].entry() {
            Entry::Exec(spec) => assert_eq!(spec.env.get("MODE").map(String::as_str), Some("fast")),
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn custom_group_needs_explicit_limit() {
        let cfg = FileConfig::parse("groups:\n  custom:\n    jobs: []\n").unwrap();
        let err = cfg.plan("custom", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unbounded_group() {
        let plan = sample().plan("adhoc", &Overrides::default()).unwrap();
        assert_eq!(plan.limits.soft, Duration::from_secs(30));
        assert!(plan.limits.hard_deadline().is_none());
        assert!(plan.items.is_empty());
    }

    #[test]
    fn conflicting_hard_limits_are_rejected() {
        let err = sample().plan("broken", &Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn overrides_take_precedence() {
        let overrides = Overrides {
            time_limit_secs: Some(5),
            hard_limit_secs: Some(7),
            max_concurrency: Some(1),
            ..Default::default()
        };
        let plan = sample().plan("adhoc", &overrides).unwrap();
        assert_eq!(plan.limits.soft, Duration::from_secs(5));
        assert_eq!(plan.limits.hard_deadline(), Some(Duration::from_secs(7)));
        assert_eq!(plan.max_concurrency, Some(1));
    }

    #[test]
    fn unknown_group_and_fields() {
        assert!(matches!(
            sample().plan("nope", &Overrides::default()),
            Err(ConfigError::UnknownGroup(g)) if g == "nope"
        ));
        assert!(matches!(FileConfig::parse("bogus: 1\n"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.groups.len(), 3);

        let missing = load(Path::new("/nonexistent/cronvisor.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
