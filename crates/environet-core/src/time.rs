//! Wall-clock timestamps for records, data points, and session files.
//!
//! Timestamps are milliseconds since the Unix epoch and travel through CSV and
//! JSON as RFC 3339 UTC strings (`2026-02-15T01:30:00.250Z`).

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis().max(0) as u64)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    fn datetime(&self) -> DateTime<Utc> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_default()
    }

    /// Full ISO-8601 form with millisecond precision.
    /// Example: `2026-02-15T01:30:00.250Z`
    pub fn to_iso8601(&self) -> String {
        self.datetime().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Compact form safe for directory and file names.
    /// Example: `2026-02-15T013000Z`
    pub fn to_compact(&self) -> String {
        self.datetime().format("%Y-%m-%dT%H%M%SZ").to_string()
    }

    /// Parse an RFC 3339 timestamp. Any offset is accepted and converted to
    /// UTC; fractions finer than a millisecond are truncated. Instants before
    /// the epoch yield `None`.
    pub fn parse_iso8601(s: &str) -> Option<Self> {
        let parsed = DateTime::parse_from_rfc3339(s.trim()).ok()?;
        let ms = parsed.with_timezone(&Utc).timestamp_millis();
        u64::try_from(ms).ok().map(Self)
    }

    /// Time elapsed between `earlier` and `self`, saturating at zero.
    pub fn since(&self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse_iso8601(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{s}'")))
    }
}
