use crate::error::{validation_error, CalendarResult};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;

/// Number of days a month grid shows (six full weeks)
pub const MONTH_GRID_DAYS: i64 = 42;

/// A calendar month, ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthAndYear {
    year: i32,
    month: u32,
}

impl MonthAndYear {
    /// Create a month, `month` is 1-based
    pub fn new(year: i32, month: u32) -> CalendarResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(validation_error(&format!("Invalid month: {}", month)));
        }
        Ok(Self { year, month })
    }

    /// Month containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parse a `YYYY-MM` month key
    pub fn parse_key(key: &str) -> CalendarResult<Self> {
        let (year, month) = key
            .split_once('-')
            .ok_or_else(|| validation_error(&format!("Invalid month key: {}", key)))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| validation_error(&format!("Invalid year in month key: {}", key)))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| validation_error(&format!("Invalid month in month key: {}", key)))?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shift by a number of months, wrapping years in both directions
    pub fn add_months(&self, delta: i32) -> Self {
        let index = self.year * 12 + (self.month as i32 - 1) + delta;
        Self {
            year: index.div_euclid(12),
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MAX)
    }

    pub fn last_day(&self) -> NaiveDate {
        let next = self.add_months(1).first_day();
        next.pred_opt().unwrap_or(next)
    }

    /// Storage key for the month, `YYYY-MM`
    pub fn key(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for MonthAndYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first_day().format("%B %Y"))
    }
}

/// Half-open date range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> CalendarResult<Self> {
        if start > end {
            return Err(validation_error(&format!(
                "Range start {} is after its end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Create a range from an inclusive end date
    pub fn from_inclusive(start: NaiveDate, end_inclusive: NaiveDate) -> CalendarResult<Self> {
        if start > end_inclusive {
            return Err(validation_error(&format!(
                "Start date {} is after end date {}",
                start, end_inclusive
            )));
        }
        Ok(Self {
            start,
            end: exclusive_end(end_inclusive),
        })
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: exclusive_end(date),
        }
    }

    /// The whole of one month
    pub fn month(month: MonthAndYear) -> Self {
        Self {
            start: month.first_day(),
            end: month.add_months(1).first_day(),
        }
    }

    /// From the first day of `from` to the last day of `to`
    pub fn months_span(from: MonthAndYear, to: MonthAndYear) -> CalendarResult<Self> {
        Self::new(from.first_day(), to.add_months(1).first_day())
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Whether `[start, end_exclusive)` intersects this range
    pub fn overlaps(&self, start: NaiveDate, end_exclusive: NaiveDate) -> bool {
        start < self.end && self.start < end_exclusive
    }

    /// Every date inside the range
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day < end)
    }

    /// Months touched by the range
    pub fn months(&self) -> Vec<MonthAndYear> {
        match self.end.pred_opt() {
            Some(last) if !self.is_empty() => months_between(self.start, last),
            _ => Vec::new(),
        }
    }

    /// Widen the range by `days` on both sides
    pub fn padded(&self, days: i64) -> Self {
        let padding = Duration::days(days.max(0));
        Self {
            start: self.start.checked_sub_signed(padding).unwrap_or(self.start),
            end: self.end.checked_add_signed(padding).unwrap_or(self.end),
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Exclusive end for an inclusive end date
pub fn exclusive_end(end_inclusive: NaiveDate) -> NaiveDate {
    end_inclusive.succ_opt().unwrap_or(end_inclusive)
}

/// Months covered by the inclusive range `[start, end_inclusive]`
pub fn months_between(start: NaiveDate, end_inclusive: NaiveDate) -> Vec<MonthAndYear> {
    let mut months = Vec::new();
    if start > end_inclusive {
        return months;
    }

    let last = MonthAndYear::from_date(end_inclusive);
    let mut current = MonthAndYear::from_date(start);
    while current <= last {
        months.push(current);
        current = current.add_months(1);
    }
    months
}

/// Visible range of a month view: six weeks starting on `week_start`
pub fn month_grid_range(month: MonthAndYear, week_start: Weekday) -> DateRange {
    let first = month.first_day();
    let offset = (first.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    let start = first
        .checked_sub_signed(Duration::days(offset as i64))
        .unwrap_or(first);
    let end = start
        .checked_add_signed(Duration::days(MONTH_GRID_DAYS))
        .unwrap_or(start);
    DateRange { start, end }
}

/// Today's date in the given timezone
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// Format a date as `MM/DD/YYYY`
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%m/%d/%Y").to_string()
}

/// Format an inclusive date range for display
pub fn format_date_range(start: NaiveDate, end_inclusive: NaiveDate) -> String {
    if start == end_inclusive {
        format_short_date(start)
    } else {
        format!("{} - {}", format_short_date(start), format_short_date(end_inclusive))
    }
}

/// Parse either `YYYY-MM-DD` or an RFC 3339 timestamp into a date.
///
/// Timestamps are read as their UTC calendar date, whatever offset they carry.
/// Azure DevOps sends UTC midnights. A stored timestamp written from a local
/// midnight east of UTC lands on the previous day.
pub fn parse_date(value: &str) -> CalendarResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|e| validation_error(&format!("Failed to parse date {}: {}", value, e)))
}

/// Serde adapter writing `YYYY-MM-DD` and reading dates or timestamps
pub mod flexible_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        super::parse_date(&value).map_err(serde::de::Error::custom)
    }
}
