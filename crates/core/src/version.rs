//! Version stamps used as optimistic-concurrency check values.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// "Last modified" marker attached to a record at commit time.
///
/// Milliseconds since the Unix epoch. Stamps handed out for the same record
/// only ever grow; a writer must present the stamp it last read for its commit
/// to be accepted.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionStamp(u64);

impl VersionStamp {
    /// Version of a record that has never been written.
    pub const ZERO: VersionStamp = VersionStamp(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Stamp for a wall-clock instant. Instants before the epoch map to `ZERO`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(u64::try_from(at.timestamp_millis()).unwrap_or(0))
    }

    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.0).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    /// How far `self` is ahead of `earlier`, or zero if it is not.
    pub fn duration_since(self, earlier: VersionStamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl core::fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for VersionStamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<VersionStamp> for u64 {
    fn from(value: VersionStamp) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_order_by_millis() {
        assert!(VersionStamp::from_millis(2) > VersionStamp::from_millis(1));
        assert!(VersionStamp::ZERO < VersionStamp::from_millis(1));
    }

    #[test]
    fn duration_since_saturates() {
        let a = VersionStamp::from_millis(1_500);
        let b = VersionStamp::from_millis(1_000);
        assert_eq!(a.duration_since(b), Duration::from_millis(500));
        assert_eq!(b.duration_since(a), Duration::ZERO);
    }

    #[test]
    fn datetime_conversion_preserves_millis() {
        let now = Utc::now();
        let stamp = VersionStamp::from_datetime(now);
        let back = stamp.to_datetime().unwrap();
        assert_eq!(back.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn serializes_as_bare_number() {
        let json = serde_json::to_string(&VersionStamp::from_millis(42)).unwrap();
        assert_eq!(json, "42");
    }
}
