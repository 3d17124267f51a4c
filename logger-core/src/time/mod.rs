//! Time primitives shared by every controller.
//!
//! Two clocks exist on the logger. The monotonic tick clock ([`Instant`])
//! drives every "now − last event ≥ threshold" comparison and is injected by
//! the caller on each dispatcher tick, so tests can replay arbitrary timelines
//! without sleeping. The battery-backed calendar clock reports Unix epoch
//! seconds; [`CalendarTime`] converts between that representation and the
//! civil date used for file names and clock adjustment.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use crate::telemetry::TelemetryInstant;

/// Monotonic tick timestamp with millisecond resolution.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Instant(u64);

impl Instant {
    /// Timeline origin.
    pub const ZERO: Self = Self(0);

    /// Creates an instant from a millisecond count.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Creates an instant from a second count.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000))
    }

    /// Returns the millisecond count since the timeline origin.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns the elapsed time since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }

    /// Returns `true` once at least `threshold` has passed since `earlier`.
    #[must_use]
    pub fn has_elapsed(self, earlier: Self, threshold: Duration) -> bool {
        self.saturating_duration_since(earlier) >= threshold
    }
}

impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(millis))
    }
}

impl TelemetryInstant for Instant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Instant::saturating_duration_since(*self, earlier)
    }
}

const SECS_PER_MINUTE: u32 = 60;
const SECS_PER_HOUR: u32 = 60 * SECS_PER_MINUTE;
const SECS_PER_DAY: u32 = 24 * SECS_PER_HOUR;
// Days between 0000-03-01 and 1970-01-01 in the proleptic Gregorian calendar.
const UNIX_EPOCH_DAY_OFFSET: i64 = 719_468;
const DAYS_PER_ERA: i64 = 146_097;

/// Calendar date and wall-clock time as kept by the battery-backed clock.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl CalendarTime {
    #[must_use]
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Converts Unix epoch seconds into a calendar time (UTC, no leap seconds).
    #[must_use]
    pub fn from_epoch(epoch: u32) -> Self {
        let days = i64::from(epoch / SECS_PER_DAY);
        let rem = epoch % SECS_PER_DAY;
        let (year, month, day) = civil_from_days(days);

        // Both conversions are bounded: u32 epochs end in 2106 and the
        // remainder of a day always fits the hour/minute/second ranges.
        Self {
            year: u16::try_from(year).unwrap_or(u16::MAX),
            month,
            day,
            hour: (rem / SECS_PER_HOUR) as u8,
            minute: ((rem % SECS_PER_HOUR) / SECS_PER_MINUTE) as u8,
            second: (rem % SECS_PER_MINUTE) as u8,
        }
    }

    /// Converts the calendar time into Unix epoch seconds.
    ///
    /// Returns `None` for invalid dates or dates outside the `u32` epoch range.
    #[must_use]
    pub fn epoch_seconds(&self) -> Option<u32> {
        if !self.is_valid() {
            return None;
        }

        let days = days_from_civil(
            i64::from(self.year),
            i64::from(self.month),
            i64::from(self.day),
        );
        let seconds = days * i64::from(SECS_PER_DAY)
            + i64::from(self.hour) * i64::from(SECS_PER_HOUR)
            + i64::from(self.minute) * i64::from(SECS_PER_MINUTE)
            + i64::from(self.second);
        u32::try_from(seconds).ok()
    }

    /// Returns `true` when every field names a real date and time of day.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && self.day >= 1
            && self.day <= days_in_month(self.year, self.month)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }

    /// Two-digit year as written in file names.
    #[must_use]
    pub const fn year_two_digit(&self) -> u8 {
        (self.year % 100) as u8
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// Returns `true` for Gregorian leap years.
#[must_use]
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`; zero for invalid months.
#[must_use]
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month_index = if month > 2 { month - 3 } else { month + 9 };
    let day_of_year = (153 * month_index + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * DAYS_PER_ERA + day_of_era - UNIX_EPOCH_DAY_OFFSET
}

fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let shifted = days + UNIX_EPOCH_DAY_OFFSET;
    let era = shifted.div_euclid(DAYS_PER_ERA);
    let day_of_era = shifted - era * DAYS_PER_ERA;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    };
    let year = year_of_era + era * 400 + i64::from(month <= 2);

    // month is 1..=12 and day is 1..=31 by construction.
    (year, month as u8, day as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_known_epochs_to_calendar() {
        assert_eq!(
            CalendarTime::from_epoch(1_717_237_800),
            CalendarTime::new(2024, 6, 1, 10, 30, 0)
        );
        assert_eq!(
            CalendarTime::from_epoch(951_868_799),
            CalendarTime::new(2000, 2, 29, 23, 59, 59)
        );
        assert_eq!(
            CalendarTime::from_epoch(0),
            CalendarTime::new(1970, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn converts_calendar_to_epoch() {
        assert_eq!(
            CalendarTime::new(2024, 12, 31, 0, 0, 5).epoch_seconds(),
            Some(1_735_603_205)
        );
        assert_eq!(
            CalendarTime::new(2024, 6, 1, 10, 30, 0).epoch_seconds(),
            Some(1_717_237_800)
        );
    }

    #[test]
    fn rejects_impossible_dates() {
        assert!(!CalendarTime::new(2023, 2, 29, 0, 0, 0).is_valid());
        assert!(CalendarTime::new(2024, 2, 29, 0, 0, 0).is_valid());
        assert!(!CalendarTime::new(2024, 0, 10, 0, 0, 0).is_valid());
        assert!(!CalendarTime::new(2024, 4, 31, 0, 0, 0).is_valid());
        assert!(!CalendarTime::new(2024, 4, 30, 24, 0, 0).is_valid());
        assert_eq!(CalendarTime::new(2024, 13, 1, 0, 0, 0).epoch_seconds(), None);
    }

    #[test]
    fn instant_arithmetic_saturates() {
        let start = Instant::from_millis(1_500);
        let later = start + Duration::from_millis(250);
        assert_eq!(later.as_millis(), 1_750);
        assert_eq!(
            start.saturating_duration_since(later),
            Duration::ZERO,
            "earlier minus later must clamp to zero"
        );
        assert!(later.has_elapsed(start, Duration::from_millis(250)));
        assert!(!later.has_elapsed(start, Duration::from_millis(251)));
    }
}
