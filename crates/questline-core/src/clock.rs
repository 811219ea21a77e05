//! Wall-clock access and fixed-zone day boundaries.
//!
//! Two concerns live here:
//!
//! - [`Clock`] is the injected source of "now". Production code uses
//!   [`SystemClock`]; tests and replays use [`ManualClock`].
//! - [`DayClock`] renders instants as calendar days and timestamps in one
//!   fixed UTC offset, so "today" compares equal across devices whose local
//!   zones differ.
//!
//! Rendering helpers are deliberately permissive: malformed string input
//! yields an empty string rather than an error.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};

/// Errors that can occur when constructing a [`DayClock`].
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// The configured offset is not a valid UTC offset.
    #[error("invalid UTC offset: {minutes} minutes")]
    InvalidOffset {
        /// The rejected offset.
        minutes: i32,
    },
}

/// Source of the current instant.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Return the current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Return the current instant as Unix milliseconds.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// The host's real-time clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(instant.timestamp_millis()),
        }
    }

    /// Jump to the given instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.millis.store(instant.timestamp_millis(), Ordering::Release);
    }

    /// Move forward by the given number of milliseconds.
    pub fn advance_millis(&self, millis: i64) {
        let current = self.millis.load(Ordering::Acquire);
        self.millis
            .store(current.saturating_add(millis), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::Acquire)).unwrap_or_default()
    }
}

/// Calendar-day and timestamp rendering in one fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    offset: FixedOffset,
}

impl DayClock {
    /// Create a day clock for the given offset in minutes east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidOffset`] if the offset is a day or more.
    pub fn new(utc_offset_minutes: i32) -> Result<Self, ClockError> {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ClockError::InvalidOffset {
                minutes: utc_offset_minutes,
            })?;
        Ok(Self { offset })
    }

    /// A day clock pinned to UTC.
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// The configured offset.
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Render the calendar day containing `instant` as `YYYY-MM-DD`.
    pub fn date_only(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format("%Y-%m-%d")
            .to_string()
    }

    /// Render `instant` as ISO-8601 with the fixed offset, millisecond precision.
    pub fn timestamp_iso(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .to_rfc3339_opts(SecondsFormat::Millis, false)
    }

    /// Like [`date_only`](Self::date_only) for an RFC 3339 string.
    ///
    /// Returns an empty string if `raw` does not parse.
    pub fn date_only_str(&self, raw: &str) -> String {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| self.date_only(dt.with_timezone(&Utc)))
            .unwrap_or_default()
    }

    /// Like [`timestamp_iso`](Self::timestamp_iso) for an RFC 3339 string.
    ///
    /// Returns an empty string if `raw` does not parse.
    pub fn timestamp_iso_str(&self, raw: &str) -> String {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| self.timestamp_iso(dt.with_timezone(&Utc)))
            .unwrap_or_default()
    }
}

impl Default for DayClock {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn date_only_uses_fixed_offset_not_utc() {
        let clock = DayClock::new(-300).unwrap();
        // 03:00 UTC on the 11th is 22:00 on the 10th at UTC-5.
        assert_eq!(clock.date_only(instant(2024, 1, 11, 3, 0)), "2024-01-10");
        assert_eq!(clock.date_only(instant(2024, 1, 11, 5, 0)), "2024-01-11");
    }

    #[test]
    fn timestamp_carries_offset() {
        let clock = DayClock::new(-300).unwrap();
        let ts = clock.timestamp_iso(instant(2024, 1, 10, 15, 30));
        assert_eq!(ts, "2024-01-10T10:30:00.000-05:00");
    }

    #[test]
    fn utc_clock_renders_plus_zero() {
        let clock = DayClock::utc();
        let ts = clock.timestamp_iso(instant(2024, 1, 10, 0, 0));
        assert_eq!(ts, "2024-01-10T00:00:00.000+00:00");
    }

    #[test]
    fn malformed_strings_render_empty() {
        let clock = DayClock::utc();
        assert_eq!(clock.date_only_str("not a date"), "");
        assert_eq!(clock.timestamp_iso_str(""), "");
    }

    #[test]
    fn string_input_is_converted_into_fixed_zone() {
        let clock = DayClock::new(60).unwrap();
        assert_eq!(clock.date_only_str("2024-01-10T23:30:00Z"), "2024-01-11");
    }

    #[test]
    fn offset_of_a_full_day_is_rejected() {
        assert!(DayClock::new(24 * 60).is_err());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at(instant(2024, 1, 10, 12, 0));
        clock.advance_millis(90_000);
        assert_eq!(clock.now(), instant(2024, 1, 10, 12, 1) + chrono::Duration::seconds(30));
    }
}
