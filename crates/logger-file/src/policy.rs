//! Decides whether a write must be preceded by a rotation

use crate::config::FileLoggerConfig;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

/// Why a rotation is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTrigger {
    /// The pending write would bring the active file to the size limit.
    Size,
    /// More than the rotation interval has passed since the last rotation.
    Interval,
}

impl fmt::Display for RotationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Size => write!(f, "size"),
            Self::Interval => write!(f, "interval"),
        }
    }
}

/// Size and age thresholds; zero disables either check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Maximum file size in bytes (0 = unlimited)
    pub max_file_size: u64,
    /// Maximum time between rotations (zero = never)
    pub rotation_interval: Duration,
}

impl RotationPolicy {
    /// Policy with the thresholds from `config`.
    #[must_use]
    pub const fn from_config(config: &FileLoggerConfig) -> Self {
        Self {
            max_file_size: config.max_file_size,
            rotation_interval: config.rotation_interval,
        }
    }

    /// The reason a rotation is due before appending `pending_write_size`
    /// bytes to a file of `current_size` bytes, if any. The size check wins
    /// when both apply.
    #[must_use]
    pub fn evaluate(
        &self,
        current_size: u64,
        pending_write_size: u64,
        last_rotation: DateTime<Local>,
        now: DateTime<Local>,
    ) -> Option<RotationTrigger> {
        if self.max_file_size > 0
            && current_size.saturating_add(pending_write_size) >= self.max_file_size
        {
            return Some(RotationTrigger::Size);
        }

        if !self.rotation_interval.is_zero() {
            // A clock that went backwards never counts as elapsed time
            let elapsed = now.signed_duration_since(last_rotation).to_std().ok()?;
            if elapsed > self.rotation_interval {
                return Some(RotationTrigger::Interval);
            }
        }

        None
    }

    /// Whether a rotation is due; see [`RotationPolicy::evaluate`].
    #[must_use]
    pub fn should_rotate(
        &self,
        current_size: u64,
        pending_write_size: u64,
        last_rotation: DateTime<Local>,
        now: DateTime<Local>,
    ) -> bool {
        self.evaluate(current_size, pending_write_size, last_rotation, now)
            .is_some()
    }
}
