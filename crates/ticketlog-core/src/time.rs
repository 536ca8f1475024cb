//! Vendor timestamp parsing and the microsecond [`Timestamp`] newtype used
//! throughout the event log.
//!
//! The backend emits timestamps in a single fixed format —
//! `YYYY-MM-DDThh:mm:ss.mmm±hhmm` — but every on-disk and in-memory
//! representation in this crate works in UTC microseconds so that ordering,
//! deduplication, and residency arithmetic never have to re-parse a string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const VENDOR_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

#[derive(Debug, Error)]
#[error("timestamp {raw:?} does not match the expected vendor format: {source}")]
pub struct TimestampParseError {
    raw: String,
    #[source]
    source: chrono::ParseError,
}

/// A point in time, stored as UTC microseconds since the epoch.
///
/// `Ord`/`PartialOrd` give the natural chronological ordering the event
/// store relies on; ties are broken by [`crate::events::model::EventType`]
/// at the call site, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Timestamp(dt.timestamp_micros())
    }

    pub fn to_datetime(self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.0).unwrap_or_else(|| DateTime::from_timestamp_nanos(0))
    }

    /// Wall-clock now, used as the default reference point for open items
    /// and for residency on issues that haven't reached a terminal status.
    pub fn now() -> Self {
        Timestamp::from_datetime(Utc::now())
    }

    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// Whole seconds between `self` and `other`, clamped to a minimum of one
    /// second per the residency invariant — a status visit that started and
    /// ended in the same instant still counts as having happened.
    pub fn seconds_until_clamped(self, other: Timestamp) -> i64 {
        ((other.0 - self.0) / 1_000_000).max(1)
    }

    pub fn checked_add_days(self, days: i64) -> Option<Timestamp> {
        self.to_datetime()
            .checked_add_signed(chrono::Duration::days(days))
            .map(Timestamp::from_datetime)
    }
}

/// Strict parse of the backend's fixed timestamp format.
///
/// Callers that can tolerate a missing or malformed sub-record (every caller
/// in this crate can — see the transformer's fail-soft policy) should treat
/// an `Err` here as "skip this entry", never as a reason to abort the whole
/// issue.
pub fn parse_vendor_timestamp(raw: &str) -> Result<Timestamp, TimestampParseError> {
    DateTime::parse_from_str(raw, VENDOR_TIMESTAMP_FORMAT)
        .map(|dt| Timestamp::from_datetime(dt.with_timezone(&Utc)))
        .map_err(|source| TimestampParseError {
            raw: raw.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_vendor_format() {
        let ts = parse_vendor_timestamp("2024-03-20T14:30:00.000+0000").unwrap();
        assert_eq!(ts.to_datetime().format("%Y-%m-%d %H:%M:%S").to_string(), "2024-03-20 14:30:00");
    }

    #[test]
    fn rejects_garbage_without_panicking() {
        assert!(parse_vendor_timestamp("not a timestamp").is_err());
        assert!(parse_vendor_timestamp("2024-03-20 14:30:00").is_err());
    }

    #[test]
    fn ordering_is_microsecond_precise() {
        let a = parse_vendor_timestamp("2024-03-20T14:30:00.000+0000").unwrap();
        let b = parse_vendor_timestamp("2024-03-20T14:30:00.001+0000").unwrap();
        assert!(a < b);
    }

    #[test]
    fn residency_duration_is_clamped_to_one_second() {
        let a = Timestamp(1_000_000);
        let b = Timestamp(1_000_400); // 0.4s later
        assert_eq!(a.seconds_until_clamped(b), 1);
    }
}
