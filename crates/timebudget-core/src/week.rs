//! Week identifiers keyed by ISO (year, week).
//!
//! A user's week may start on any weekday. The custom week containing a date
//! is the seven-day span beginning on the most recent week-start day, and it
//! is named after the ISO week of its fourth day. With a Monday start this is
//! exactly the ISO week.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// An (ISO year, ISO week) pair.
///
/// Ordered by (year, week). Serialized as `YYYY-Www`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekId {
    /// Monday of the ISO week; the year/week pair is derived from it.
    monday: NaiveDate,
}

/// Days elapsed since the most recent `week_start` (0..=6).
fn days_since(date: NaiveDate, week_start: Weekday) -> i64 {
    let day = date.weekday().num_days_from_monday() as i64;
    let start = week_start.num_days_from_monday() as i64;
    (day - start).rem_euclid(7)
}

impl WeekId {
    /// Build from an ISO year and week number. Returns `None` for weeks that
    /// do not exist (week 0, week 53 in a 52-week year, ...).
    pub fn new(year: i32, week: u32) -> Option<Self> {
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).map(|monday| Self { monday })
    }

    /// The week containing `date` for a user whose week starts on `week_start`.
    pub fn containing(date: NaiveDate, week_start: Weekday) -> Self {
        let first = date - Duration::days(days_since(date, week_start));
        let anchor = first + Duration::days(3);
        let monday = anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64);
        Self { monday }
    }

    /// The week containing the UTC calendar date of `at`.
    pub fn from_datetime(at: DateTime<Utc>, week_start: Weekday) -> Self {
        Self::containing(at.date_naive(), week_start)
    }

    pub fn year(&self) -> i32 {
        self.monday.iso_week().year()
    }

    pub fn week(&self) -> u32 {
        self.monday.iso_week().week()
    }

    /// First calendar day of this week for the given week-start preference.
    pub fn first_day(&self, week_start: Weekday) -> NaiveDate {
        let thursday = self.monday + Duration::days(3);
        thursday - Duration::days(days_since(thursday, week_start))
    }

    /// Half-open UTC range `[start, end)` covered by this week.
    pub fn utc_range(&self, week_start: Weekday) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.first_day(week_start).and_time(NaiveTime::MIN).and_utc();
        (start, start + Duration::days(7))
    }

    pub fn next(&self) -> Self {
        Self {
            monday: self.monday + Duration::days(7),
        }
    }

    pub fn previous(&self) -> Self {
        Self {
            monday: self.monday - Duration::days(7),
        }
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year(), self.week())
    }
}

impl FromStr for WeekId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidValue {
            field: "week".to_string(),
            message: format!("expected YYYY-Www, got '{s}'"),
        };
        let (year, week) = s.trim().split_once("-W").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        WeekId::new(year, week).ok_or_else(invalid)
    }
}

impl TryFrom<String> for WeekId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WeekId> for String {
    fn from(week: WeekId) -> Self {
        week.to_string()
    }
}
