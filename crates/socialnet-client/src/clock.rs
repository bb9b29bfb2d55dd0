//! Wall clock and the user-controlled skew applied to outgoing timestamps.

use chrono::{DateTime, Local, TimeDelta};
use std::fmt;

/// Format of the send time attached to posts.
pub const POST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Largest accepted skew, about a century either way.
pub const MAX_OFFSET_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Seconds subtracted from the wall clock before stamping a message.
///
/// Positive values make this client look behind; negative, ahead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockOffset(i64);

impl ClockOffset {
    pub const ZERO: Self = Self(0);

    /// Fails beyond [`MAX_OFFSET_SECS`] in either direction.
    pub fn from_secs(secs: i64) -> Result<Self, OffsetOutOfRange> {
        if secs.unsigned_abs() > MAX_OFFSET_SECS.unsigned_abs() {
            return Err(OffsetOutOfRange(secs));
        }
        Ok(Self(secs))
    }

    pub fn secs(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `now` moved back by the offset.
    pub fn apply(self, now: DateTime<Local>) -> DateTime<Local> {
        now - TimeDelta::seconds(self.0)
    }
}

impl fmt::Display for ClockOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("clock delay of {0} seconds is out of range")]
pub struct OffsetOutOfRange(pub i64);
