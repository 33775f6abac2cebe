//! Pure admission arithmetic of the scheduling loop.
use std::time::Duration;

/// Smallest tick the loop accepts.
pub(crate) const MIN_TICK: Duration = Duration::from_millis(1);

/// Number of pending workers to admit given the concurrency cap.
///
/// `None` means no cap: everything pending is admitted.
pub fn free_slots(max_concurrency: Option<usize>, running: usize, pending: usize) -> usize {
    match max_concurrency {
        Some(max) => max.saturating_sub(running).min(pending),
        None => pending,
    }
}

/// Tick budget of the loop: `ceil(hard / tick)`, `None` when there is no hard deadline.
pub fn tick_budget(hard: Option<Duration>, tick: Duration) -> Option<u64> {
    let tick = tick.max(MIN_TICK).as_nanos();
    hard.map(|h| {
        let ticks = h.as_nanos().div_ceil(tick);
        u64::try_from(ticks).unwrap_or(u64::MAX)
    })
}

/// `true` when nothing is running and nothing more can be admitted.
pub fn is_settled(max_concurrency: Option<usize>, running: usize, pending: usize) -> bool {
    running == 0 && free_slots(max_concurrency, 0, pending) == 0
}
