use std::time::Duration;

/// Multiplier applied to the soft limit when no explicit hard limit is given.
pub const HARD_LIMIT_FACTOR: u32 = 4;

/// Deadline at which still-running workers are forcibly terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HardLimit {
    /// `HARD_LIMIT_FACTOR` times the soft limit.
    #[default]
    Default,
    /// Explicit deadline measured from the start of the run.
    After(Duration),
    /// No deadline; the run ends only when every worker finished.
    Unbounded,
}

/// Time budget of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLimits {
    /// Advisory budget. Overrunning it marks the run as errored but stops nothing.
    pub soft: Duration,
    pub hard: HardLimit,
}

impl TimeLimits {
    pub fn new(soft: Duration) -> Self {
        Self {
            soft,
            hard: HardLimit::Default,
        }
    }

    pub fn from_secs(soft: u64) -> Self {
        Self::new(Duration::from_secs(soft))
    }

    pub fn with_hard(mut self, hard: Duration) -> Self {
        self.hard = HardLimit::After(hard);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.hard = HardLimit::Unbounded;
        self
    }

    /// Resolved kill deadline, `None` when unbounded.
    pub fn hard_deadline(&self) -> Option<Duration> {
        match self.hard {
            HardLimit::Default => Some(self.soft * HARD_LIMIT_FACTOR),
            HardLimit::After(d) => Some(d),
            HardLimit::Unbounded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hard_limit_is_four_times_soft() {
        let limits = TimeLimits::from_secs(5);
        assert_eq!(limits.hard_deadline(), Some(Duration::from_secs(20)));
    }

    #[test]
    fn explicit_hard_limit_wins() {
        let limits = TimeLimits::from_secs(5).with_hard(Duration::from_secs(7));
        assert_eq!(limits.hard_deadline(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn unbounded_has_no_deadline() {
        let limits = TimeLimits::from_secs(5).unbounded();
        assert_eq!(limits.hard, HardLimit::Unbounded);
        assert!(limits.hard_deadline().is_none());
    }
}
