//! Named dashboard time windows
//!
//! Charts offer "last day", "last 7 days" and "last 30 days" pickers. Each name
//! resolves against the current time when the query is built.

use super::error::QueryError;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeWindow {
    LastDay,
    LastWeek,
    LastMonth,
}

impl RangeWindow {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastDay => "last-1-day",
            Self::LastWeek => "last-7-day",
            Self::LastMonth => "last-30-day",
        }
    }
}

impl fmt::Display for RangeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeWindow {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-1-day" => Ok(Self::LastDay),
            "last-7-day" => Ok(Self::LastWeek),
            "last-30-day" => Ok(Self::LastMonth),
            other => Err(QueryError::InvalidWindow(other.to_string())),
        }
    }
}

/// A concrete `[start, end]` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub fn start_secs(&self) -> i64 {
        self.start.timestamp()
    }

    #[must_use]
    pub fn end_secs(&self) -> i64 {
        self.end.timestamp()
    }
}

/// Resolve `window` against the local wall clock
#[must_use]
pub fn resolve(window: RangeWindow) -> TimeRange {
    resolve_at(window, Local::now())
}

/// Resolve a window by its name, e.g. `"last-7-day"`
///
/// # Errors
///
/// Returns `InvalidWindow` for an unrecognized name.
pub fn resolve_named(name: &str) -> Result<TimeRange, QueryError> {
    name.parse().map(resolve)
}

/// Resolve `window` against an explicit `now`
///
/// `last-1-day` spans the trailing 24 hours. The week and month windows start
/// at midnight of the current day (in `now`'s time zone) minus 7 or 30 days.
/// Both end at `now`.
#[must_use]
pub fn resolve_at<Tz: TimeZone>(window: RangeWindow, now: DateTime<Tz>) -> TimeRange {
    let end = now.with_timezone(&Utc);

    let start = match window {
        RangeWindow::LastDay => end - Duration::hours(24),
        RangeWindow::LastWeek => start_of_day(&now) - Duration::days(7),
        RangeWindow::LastMonth => start_of_day(&now) - Duration::days(30),
    };

    TimeRange { start, end }
}

fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN);

    // a DST jump can skip local midnight; fall back to UTC midnight then
    now.timezone()
        .from_local_datetime(&midnight)
        .earliest()
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}
