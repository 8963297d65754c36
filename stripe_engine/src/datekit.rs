//! Calendar-date arithmetic fixed to a single timezone (UTC+10, no DST).
//!
//! Day indices, leap years, and day boundaries all go through this module so
//! the rest of the engine never touches `chrono::Utc::now()` or the system
//! timezone directly.

use chrono::{Datelike, NaiveDate, TimeZone};
use chrono_tz::Tz;

/// Fixed timezone the engine reasons about day boundaries in. AEST, no DST
/// (UTC+10 year-round, i.e. a 600-minute offset).
pub const FIXED_TZ: Tz = chrono_tz::Australia::Brisbane;

/// A civil date in [`FIXED_TZ`]. Total ordering by `(year, month, day)`
/// falls out of deriving `Ord` on `NaiveDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn jan1(year: i32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1 always exists"))
    }

    pub fn dec31(year: i32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, 12, 31).expect("December 31 always exists"))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Zero-based ordinal day within the year (0 = 1 January).
    pub fn day_index(&self) -> u32 {
        self.0.ordinal0()
    }

    pub fn succ(&self) -> Self {
        Self(self.0.succ_opt().expect("date arithmetic stays in range"))
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + chrono::Duration::days(days))
    }

    /// Inclusive day count between `self` and `other` (may be negative if
    /// `other` precedes `self`).
    pub fn days_until(&self, other: &Self) -> i64 {
        (other.0 - self.0).num_days()
    }

    pub fn is_leap_year(year: i32) -> bool {
        NaiveDate::from_ymd_opt(year, 1, 1)
            .map(|d| d.leap_year())
            .unwrap_or(false)
    }

    /// 366 for a leap year, else 365.
    pub fn days_in_year(year: i32) -> u32 {
        if Self::is_leap_year(year) { 366 } else { 365 }
    }

    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }
}

/// Returns "today" in [`FIXED_TZ`], given a UTC instant. The engine never
/// calls this with the live wall clock directly outside of the host's input
/// plumbing — tests pass a fixed `chrono::DateTime<Utc>` instead.
pub fn today_in_fixed_tz(now_utc: chrono::DateTime<chrono::Utc>) -> CalendarDay {
    let local = now_utc.with_timezone(&FIXED_TZ);
    CalendarDay::from_ymd(local.year(), local.month(), local.day())
        .expect("chrono-derived y/m/d is always a valid date")
}
