//! Refresh interval representation.
//!
//! Intervals travel as plain millisecond counts on the wire, so the newtype
//! is transparent for serialization.

use core::fmt;
use core::time::Duration;

/// How often a metric's data source is re-queried, in milliseconds.
///
/// Also the freshness window of the metric's cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RefreshInterval(pub u64);

impl RefreshInterval {
    /// Smallest interval an operator may configure.
    pub const MIN: RefreshInterval = RefreshInterval(5_000);

    /// Interval used when a descriptor does not specify one.
    pub const DEFAULT: RefreshInterval = RefreshInterval(60_000);

    /// Create from milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Create from seconds.
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1000)
    }

    /// Get the value in milliseconds.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Convert to a standard Duration.
    pub const fn to_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }

    /// Whether the interval satisfies the configured minimum.
    pub const fn is_allowed(&self) -> bool {
        self.0 >= Self::MIN.0
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<Duration> for RefreshInterval {
    fn from(d: Duration) -> Self {
        Self(d.as_millis() as u64)
    }
}

impl From<RefreshInterval> for Duration {
    fn from(r: RefreshInterval) -> Self {
        r.to_duration()
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 1000 == 0 {
            write!(f, "{}s", self.0 / 1000)
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}
