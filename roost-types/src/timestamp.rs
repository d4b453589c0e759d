//! Commit timestamps assigned by the datastore.
//!
//! The realtime channel stamps every change with the commit time of the
//! transaction that produced it. Redelivered changes carry the same stamp,
//! which is what makes it usable as part of a dedup key.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A server commit timestamp with microsecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerTimestamp {
    /// Microseconds since the Unix epoch.
    micros: i64,
}

impl ServerTimestamp {
    /// Creates a timestamp from microseconds since the Unix epoch.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self {
            micros: millis.saturating_mul(1_000),
        }
    }

    /// Creates a timestamp at the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Parses a commit timestamp.
    ///
    /// Accepts RFC 3339 (`2024-05-01T10:00:00.123Z`) and the Postgres text
    /// form (`2024-05-01 10:00:00.123+00`).
    pub fn parse(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim();
        let parsed = DateTime::parse_from_rfc3339(trimmed)
            .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z"))
            .map_err(|e| crate::Error::InvalidTimestamp(format!("{trimmed:?}: {e}")))?;
        Ok(Self::from(parsed.with_timezone(&Utc)))
    }

    /// Returns microseconds since the Unix epoch.
    #[must_use]
    pub const fn as_micros(&self) -> i64 {
        self.micros
    }

    /// Returns milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.micros.div_euclid(1_000)
    }

    /// Absolute distance between two timestamps.
    #[must_use]
    pub fn abs_diff(&self, other: &Self) -> Duration {
        Duration::from_micros(self.micros.abs_diff(other.micros))
    }

    /// Returns true if `other` lies strictly within `window` of `self`.
    #[must_use]
    pub fn is_within(&self, other: &Self, window: Duration) -> bool {
        self.abs_diff(other) < window
    }

    /// Returns this timestamp shifted back by `by`, saturating at the epoch
    /// range limits.
    #[must_use]
    pub fn saturating_sub(&self, by: Duration) -> Self {
        let by = i64::try_from(by.as_micros()).unwrap_or(i64::MAX);
        Self {
            micros: self.micros.saturating_sub(by),
        }
    }

    /// Converts to a UTC date-time.
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_micros(self.micros)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl From<DateTime<Utc>> for ServerTimestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self {
            micros: dt.timestamp_micros(),
        }
    }
}

impl FromStr for ServerTimestamp {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ServerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.to_datetime()
                .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
        )
    }
}
