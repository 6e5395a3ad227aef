//! Time source used for rotation decisions and filename rendering
//!
//! Also hosts the cadence arithmetic shared by the scheduler and the
//! start-up recovery path: boundaries are multiples of the rotation interval
//! counted from the Unix epoch in local wall-clock time, so a 24h interval
//! lands on local midnight.

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current local time.
    fn now(&self) -> DateTime<Local>;
}

/// Real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

fn interval_millis(interval: Duration) -> i64 {
    i64::try_from(interval.as_millis()).unwrap_or(i64::MAX).max(1)
}

/// Milliseconds since the epoch as seen on a local wall clock.
fn local_millis(time: &DateTime<Local>) -> i64 {
    time.timestamp_millis() + i64::from(time.offset().local_minus_utc()) * 1000
}

/// Time left until the next cadence boundary strictly after `now`.
pub(crate) fn until_next_boundary(now: &DateTime<Local>, interval: Duration) -> Duration {
    let step = interval_millis(interval);
    let elapsed = local_millis(now).rem_euclid(step);
    Duration::from_millis(u64::try_from(step - elapsed).unwrap_or(0))
}

/// The last cadence boundary at or before `time`.
pub(crate) fn boundary_floor(time: DateTime<Local>, interval: Duration) -> DateTime<Local> {
    let step = interval_millis(interval);
    let elapsed = local_millis(&time).rem_euclid(step);
    time.checked_sub_signed(TimeDelta::milliseconds(elapsed)).unwrap_or(time)
}

/// The boundary the scheduler should fire next, given the one it fired last.
///
/// The boundary after `last_fired` is kept even when the wall clock reads
/// slightly before `last_fired`. Boundaries already passed (the previous
/// rotation ran long) collapse into the latest one, which is due immediately.
pub(crate) fn next_boundary(
    now: DateTime<Local>,
    last_fired: Option<DateTime<Local>>,
    interval: Duration,
) -> DateTime<Local> {
    let step = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
    match last_fired.and_then(|last| last.checked_add_signed(step)) {
        Some(due) if due <= now => boundary_floor(now, interval),
        Some(due) => due,
        None => {
            let wait = TimeDelta::from_std(until_next_boundary(&now, interval))
                .unwrap_or(TimeDelta::MAX);
            now.checked_add_signed(wait).unwrap_or(now)
        }
    }
}
