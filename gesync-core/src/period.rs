//! Relative period expressions like `10d`, `2m`, `1y`.
//!
//! Months and years are fixed-length (30 and 365 days). This is not
//! calendar arithmetic: `1y` from 2024-01-01 lands on 2024-12-31.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, TimeDelta};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SyncError, SyncResult};

static PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)([dmy])$").expect("PERIOD_RE pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodUnit {
    Day,
    Month,
    Year,
}

impl PeriodUnit {
    fn days(self) -> i64 {
        match self {
            PeriodUnit::Day => 1,
            PeriodUnit::Month => 30,
            PeriodUnit::Year => 365,
        }
    }

    fn suffix(self) -> char {
        match self {
            PeriodUnit::Day => 'd',
            PeriodUnit::Month => 'm',
            PeriodUnit::Year => 'y',
        }
    }
}

/// A parsed `<integer><unit>` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub amount: u32,
    pub unit: PeriodUnit,
}

impl Period {
    pub fn days(&self) -> i64 {
        i64::from(self.amount) * self.unit.days()
    }

    /// The date `self` after `start`.
    pub fn end_from(&self, start: NaiveDate) -> SyncResult<NaiveDate> {
        TimeDelta::try_days(self.days())
            .and_then(|delta| start.checked_add_signed(delta))
            .ok_or_else(|| SyncError::Period(format!("{} from {} is out of range", self, start)))
    }
}

impl FromStr for Period {
    type Err = SyncError;

    fn from_str(s: &str) -> SyncResult<Self> {
        let format_error = || {
            SyncError::Period(format!(
                "period {} is not specified in the appropriate format (expected e.g. 10d, 2m, 1y)",
                s
            ))
        };

        let caps = PERIOD_RE.captures(s).ok_or_else(format_error)?;
        let amount: u32 = caps[1].parse().map_err(|_| format_error())?;
        let unit = match &caps[2] {
            "d" => PeriodUnit::Day,
            "m" => PeriodUnit::Month,
            "y" => PeriodUnit::Year,
            _ => return Err(format_error()),
        };

        Ok(Period { amount, unit })
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// Parse `expression` and add it to `start`.
pub fn compute_period(expression: &str, start: NaiveDate) -> SyncResult<NaiveDate> {
    expression.parse::<Period>()?.end_from(start)
}

/// Like [`compute_period`], but the period must cover at least one day.
pub fn compute_sync_period(expression: &str, start: NaiveDate) -> SyncResult<NaiveDate> {
    let period: Period = expression.parse()?;
    if period.days() == 0 {
        return Err(SyncError::Period(format!(
            "period {} must span at least one day",
            period
        )));
    }
    period.end_from(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days() {
        assert_eq!(compute_period("10d", date(2024, 1, 1)).unwrap(), date(2024, 1, 11));
    }

    #[test]
    fn test_months_are_thirty_days() {
        assert_eq!(compute_period("2m", date(2024, 1, 1)).unwrap(), date(2024, 3, 1));
    }

    #[test]
    fn test_years_are_365_days() {
        assert_eq!(compute_period("1y", date(2024, 1, 1)).unwrap(), date(2024, 12, 31));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["10x", "d10", "", "10", "1.5d", " 10d", "-3d", "10dd"] {
            assert!(
                matches!(compute_period(bad, date(2024, 1, 1)), Err(SyncError::Period(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_overflowing_amount() {
        assert!(compute_period("99999999999d", date(2024, 1, 1)).is_err());
        assert!(compute_period("4000000000y", date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_sync_period_rejects_zero_length() {
        for empty in ["0d", "0m", "00y"] {
            assert!(
                matches!(
                    compute_sync_period(empty, date(2024, 1, 1)),
                    Err(SyncError::Period(msg)) if msg.contains("at least one day")
                ),
                "expected {:?} to be rejected",
                empty
            );
        }
        assert_eq!(compute_sync_period("1d", date(2024, 1, 1)).unwrap(), date(2024, 1, 2));
    }

    #[test]
    fn test_display_roundtrips_expression() {
        let period: Period = "2m".parse().unwrap();
        assert_eq!(period.to_string(), "2m");
        assert_eq!(period.days(), 60);
    }
}
