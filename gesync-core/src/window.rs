//! The date range one sync pass clears and refills.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, TimeZone};

use crate::error::{SyncError, SyncResult};
use crate::event::localize;
use crate::period::compute_sync_period;

/// `[clear_from, end)` for one sync pass.
///
/// `clear_from` is midnight of the day the sync runs. Events starting
/// before it are never listed, deleted or inserted, so history predating
/// today survives every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncWindow {
    pub clear_from: DateTime<FixedOffset>,
    /// First day fetched from the portal (never before `clear_from`'s day)
    pub fetch_start: NaiveDate,
    /// First day not fetched
    pub end: NaiveDate,
}

impl SyncWindow {
    /// Window for a sync running on `today` in zone `tz`.
    ///
    /// A `start` before `today` is moved up to `today`, so everything
    /// inserted lands inside the range the next run will clear.
    pub fn new<T: TimeZone>(
        today: NaiveDate,
        tz: &T,
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<Self> {
        let fetch_start = start.max(today);

        if end <= fetch_start {
            return Err(SyncError::Period(format!(
                "end date {} must be after start date {}",
                end, fetch_start
            )));
        }

        Ok(SyncWindow {
            clear_from: midnight(today, tz),
            fetch_start,
            end,
        })
    }

    /// Window for a clear-only pass: nothing is fetched, so there is no end
    /// to validate.
    pub fn clear_only<T: TimeZone>(today: NaiveDate, tz: &T) -> Self {
        SyncWindow {
            clear_from: midnight(today, tz),
            fetch_start: today,
            end: today,
        }
    }

    /// Clear-only window for a pass running now, in the machine's local zone.
    pub fn clear_only_from_now() -> Self {
        Self::clear_only(Local::now().date_naive(), &Local)
    }

    /// Window for a sync running now, in the machine's local zone.
    ///
    /// `start` defaults to today; `end` defaults to `period` after `start`.
    pub fn from_args(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        period: &str,
    ) -> SyncResult<Self> {
        let today = Local::now().date_naive();
        let start = start.unwrap_or(today);

        let end = match end {
            Some(end) => end,
            None => compute_sync_period(period, start)?,
        };

        Self::new(today, &Local, start, end)
    }
}

fn midnight<T: TimeZone>(day: NaiveDate, tz: &T) -> DateTime<FixedOffset> {
    localize(day.and_time(chrono::NaiveTime::MIN), tz).fixed_offset()
}
