//! Fixed civil timezone and calendar math.
//!
//! The source system interprets every wall-clock field at a fixed UTC-5
//! offset (Eastern Standard, no daylight-saving adjustment) and persists
//! instants as UTC. All conversions live behind this module so a
//! DST-aware implementation can replace them wholesale; the fixed offset
//! is kept for date-boundary compatibility, not because it is correct
//! year-round.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

const CIVIL_OFFSET_HOURS: i32 = -5;

/// The fixed business-timezone offset (UTC-5, no DST).
pub fn civil_offset() -> FixedOffset {
    // Statically valid; -5h is well inside FixedOffset's range.
    FixedOffset::east_opt(CIVIL_OFFSET_HOURS * 3600).unwrap()
}

/// Calendar date and wall-clock time as experienced by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilStamp {
    pub date: NaiveDate,
    /// Zero-padded 24-hour "HH:MM".
    pub time: String,
}

/// Convert a stored UTC instant into its civil date and "HH:MM" time.
pub fn to_civil(instant: DateTime<Utc>) -> CivilStamp {
    let local = instant.with_timezone(&civil_offset());
    CivilStamp {
        date: local.date_naive(),
        time: local.format("%H:%M").to_string(),
    }
}

/// Convert a civil date and "HH:MM" time back into a UTC instant.
pub fn from_civil(date: NaiveDate, time: &str) -> Result<DateTime<Utc>> {
    let tod = parse_hhmm(time)?;
    let local = date
        .and_time(tod)
        .and_local_timezone(civil_offset())
        .single()
        .ok_or_else(|| {
            LedgerError::DateError(format!("Ambiguous civil time {} {}", date, time))
        })?;
    Ok(local.with_timezone(&Utc))
}

/// Parse a zero-padded 24-hour "HH:MM" string.
pub fn parse_hhmm(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| LedgerError::InvalidTime(time.to_string()))
}

/// Clock hour (0-23) of an "HH:MM" string.
pub fn hour_of(time: &str) -> Result<u32> {
    use chrono::Timelike;
    Ok(parse_hhmm(time)?.hour())
}

/// Today's civil calendar date for a given UTC instant.
///
/// This is the one "today" boundary rule in the crate: fixed-offset civil
/// midnight, never UTC midnight.
pub fn civil_today(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&civil_offset()).date_naive()
}

/// Granularity of a summary period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    Month,
    Year,
}

/// Resolve the inclusive `[start, end]` civil window anchored at a
/// reference date.
pub fn period_window(reference: NaiveDate, mode: ViewMode) -> (NaiveDate, NaiveDate) {
    match mode {
        ViewMode::Day => (reference, reference),
        ViewMode::Month => {
            let start = reference.with_day(1).unwrap_or(reference);
            let end = last_day_of_month(reference.year(), reference.month());
            (start, end)
        }
        ViewMode::Year => {
            let start = NaiveDate::from_ymd_opt(reference.year(), 1, 1).unwrap_or(reference);
            let end = NaiveDate::from_ymd_opt(reference.year(), 12, 31).unwrap_or(reference);
            (start, end)
        }
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .checked_sub_days(Days::new(1))
        .unwrap()
}

/// Resolve a bill's day-of-month against a concrete year/month, clamping
/// to the month's length (a due day of 31 lands on Feb 28/29).
pub fn due_date_in_month(year: i32, month: u32, due_day: u32) -> NaiveDate {
    let month_end = last_day_of_month(year, month);
    let day = due_day.min(month_end.day());
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(month_end)
}

/// First due date on/after `start`: the clamped due date in `start`'s
/// month, rolled forward one civil month (with year rollover) when it has
/// already passed. Used only by the payment plan; summary totals never
/// roll forward.
pub fn next_due_date(due_day: u32, start: NaiveDate) -> NaiveDate {
    let due = due_date_in_month(start.year(), start.month(), due_day);
    if due >= start {
        return due;
    }

    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    due_date_in_month(year, month, due_day)
}

/// Inclusive day count from `start` through `end`, floored at 1.
pub fn days_elapsed(start: NaiveDate, end: NaiveDate) -> i64 {
    ((end - start).num_days() + 1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_civil_round_trip() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 19, 5, 0).unwrap();
        let stamp = to_civil(instant);
        assert_eq!(stamp.date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(stamp.time, "14:05");

        let back = from_civil(stamp.date, &stamp.time).unwrap();
        assert_eq!(back, instant);
    }

    #[test]
    fn test_civil_date_boundary() {
        // 02:30 UTC is still the previous civil day at UTC-5.
        let instant = Utc.with_ymd_and_hms(2024, 3, 5, 2, 30, 0).unwrap();
        let stamp = to_civil(instant);
        assert_eq!(stamp.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(stamp.time, "21:30");
        assert_eq!(civil_today(instant), stamp.date);
    }

    #[test]
    fn test_parse_hhmm() {
        assert!(parse_hhmm("00:00").is_ok());
        assert!(parse_hhmm("23:59").is_ok());
        assert!(parse_hhmm("24:00").is_err());
        assert!(parse_hhmm("9:5").is_err());
        assert!(parse_hhmm("noon").is_err());
        assert_eq!(hour_of("14:05").unwrap(), 14);
    }

    #[test]
    fn test_period_window() {
        let reference = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();

        assert_eq!(period_window(reference, ViewMode::Day), (reference, reference));
        assert_eq!(
            period_window(reference, ViewMode::Month),
            (
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            )
        );
        assert_eq!(
            period_window(reference, ViewMode::Year),
            (
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            )
        );
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2023, 12),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_due_date_clamping() {
        assert_eq!(
            due_date_in_month(2023, 2, 31),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            due_date_in_month(2024, 4, 15),
            NaiveDate::from_ymd_opt(2024, 4, 15).unwrap()
        );
    }

    #[test]
    fn test_next_due_date_rolls_forward() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        // Day 5 already passed in March, so it rolls to April.
        assert_eq!(
            next_due_date(5, start),
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap()
        );
        // Day 25 is still ahead.
        assert_eq!(
            next_due_date(25, start),
            NaiveDate::from_ymd_opt(2024, 3, 25).unwrap()
        );
        // December rollover.
        let december = NaiveDate::from_ymd_opt(2024, 12, 20).unwrap();
        assert_eq!(
            next_due_date(5, december),
            NaiveDate::from_ymd_opt(2025, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_days_elapsed_floor() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(days_elapsed(d, d), 1);
        assert_eq!(days_elapsed(d, d + Days::new(6)), 7);
        // End before start still floors at one day.
        assert_eq!(days_elapsed(d, d - Days::new(3)), 1);
    }
}
