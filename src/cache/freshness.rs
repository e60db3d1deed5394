//! Freshness policy for the cached snapshot
//!
//! The backend publishes a new picture once per calendar day, a little after
//! midnight in the reference timezone. A snapshot covering day `D` stays valid
//! until 02:00:01 reference-local time on `D + 1`.

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::data::parse_calendar_date;

/// Reference timezone the product targets
pub const REFERENCE_TIMEZONE: Tz = chrono_tz::America::Sao_Paulo;

/// UTC offset of the reference timezone, used when no zone database is wanted
pub const REFERENCE_UTC_OFFSET_SECONDS: i32 = -3 * 3600;

/// Seconds after local midnight at which a new day's snapshot is expected
const GRACE_SECONDS: i64 = 2 * 3600 + 1;

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Computes the instant at which a day's grace window ends
pub trait ThresholdPolicy: Send + Sync {
    /// The instant of 02:00:01 reference-local time on `day`
    fn midnight_plus_grace(&self, day: NaiveDate) -> DateTime<Utc>;

    /// Human readable name of the reference zone, for logs
    fn reference_name(&self) -> String;
}

/// Local wall-clock time of the threshold on `day`
fn grace_local_time(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::default()) + Duration::seconds(GRACE_SECONDS)
}

/// Threshold computed through the IANA timezone database
#[derive(Debug, Clone, Copy)]
pub struct ZonedThreshold {
    zone: Tz,
}

impl ZonedThreshold {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }
}

impl Default for ZonedThreshold {
    fn default() -> Self {
        Self::new(REFERENCE_TIMEZONE)
    }
}

impl ThresholdPolicy for ZonedThreshold {
    fn midnight_plus_grace(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = grace_local_time(day);
        match self.zone.from_local_datetime(&local) {
            LocalResult::Single(instant) => instant.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // Skipped by a DST transition: the same wall-clock reading one hour later
            LocalResult::None => {
                let shifted = local + Duration::hours(1);
                self.zone
                    .from_local_datetime(&shifted)
                    .earliest()
                    .map(|instant| instant.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&local))
            }
        }
    }

    fn reference_name(&self) -> String {
        self.zone.name().to_string()
    }
}

/// Threshold computed with a fixed UTC offset
///
/// Ignores daylight saving: for a zone that observes DST the threshold is off
/// by the DST delta while it is in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedOffsetThreshold {
    offset_seconds: i32,
}

impl FixedOffsetThreshold {
    /// `offset_seconds` is local time minus UTC, e.g. `-10800` for UTC-03:00
    pub fn new(offset_seconds: i32) -> Self {
        Self { offset_seconds }
    }

    pub fn offset_seconds(&self) -> i32 {
        self.offset_seconds
    }
}

impl Default for FixedOffsetThreshold {
    fn default() -> Self {
        Self::new(REFERENCE_UTC_OFFSET_SECONDS)
    }
}

impl fmt::Display for FixedOffsetThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_seconds < 0 { '-' } else { '+' };
        let total = self.offset_seconds.unsigned_abs();
        write!(f, "UTC{}{:02}:{:02}", sign, total / 3600, (total % 3600) / 60)
    }
}

impl ThresholdPolicy for FixedOffsetThreshold {
    fn midnight_plus_grace(&self, day: NaiveDate) -> DateTime<Utc> {
        let local = grace_local_time(day);
        Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(self.offset_seconds))))
    }

    fn reference_name(&self) -> String {
        self.to_string()
    }
}

/// Instant until which a snapshot covering `cached_date` is valid
///
/// Returns `None` when the date cannot be parsed.
pub fn valid_until(policy: &dyn ThresholdPolicy, cached_date: &str) -> Option<DateTime<Utc>> {
    let date = parse_calendar_date(cached_date)?;
    let next_day = date.succ_opt()?;
    Some(policy.midnight_plus_grace(next_day))
}

/// Whether a snapshot covering `cached_date` can still be served at `now`
///
/// An absent or unparseable date is never fresh.
pub fn is_fresh(
    policy: &dyn ThresholdPolicy,
    cached_date: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    cached_date
        .and_then(|date| valid_until(policy, date))
        .is_some_and(|threshold| now < threshold)
}
