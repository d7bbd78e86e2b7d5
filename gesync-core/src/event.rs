//! Schedule entries on both sides of the mirror.
//!
//! A `SourceEvent` is what the portal hands us, in naive local time. A
//! `MirrorEvent` is what we write to the target calendar: zoned, tagged
//! and carrying the fixed reminder policy.

use std::collections::BTreeMap;

use chrono::{DateTime, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::constants::{OWNERSHIP_KEY, OWNERSHIP_VALUE, PORTAL_TIMEZONE, REMINDER_MINUTES};

/// A schedule entry fetched from the portal.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEvent {
    pub title: String,
    /// Course name as the portal reports it (used for allow-listing)
    pub course_code: String,
    pub instructor: String,
    pub location: String,
    /// Start, in the portal's implicit zone
    pub start_local: NaiveDateTime,
    /// End, in the portal's implicit zone
    pub end_local: NaiveDateTime,
    /// Human label of the session kind (lecture, exercise, exam...)
    pub event_kind: String,
    /// Portal's short code for the session kind
    pub kind_code: String,
    pub is_all_day: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderMethod {
    Popup,
    Email,
}

/// A reminder relative to the event start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reminder {
    pub method: ReminderMethod,
    pub minutes: i64,
}

/// An event as written to (or read back from) the target calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorEvent {
    /// Assigned by the calendar service; `None` until inserted
    pub remote_id: Option<String>,
    pub title: String,
    pub location: Option<String>,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub reminders: Vec<Reminder>,
    /// Whether the calendar's default reminders apply on top of `reminders`
    pub use_default_reminders: bool,
    /// Private extended properties (invisible to the user)
    pub private_properties: BTreeMap<String, String>,
}

impl MirrorEvent {
    /// Build the tagged calendar event for a portal entry.
    pub fn from_source(source: &SourceEvent) -> Self {
        let mut private_properties = BTreeMap::new();
        private_properties.insert(OWNERSHIP_KEY.to_string(), OWNERSHIP_VALUE.to_string());

        let location = Some(source.location.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        MirrorEvent {
            remote_id: None,
            title: source.title.clone(),
            location,
            start: localize(source.start_local, &PORTAL_TIMEZONE),
            end: localize(source.end_local, &PORTAL_TIMEZONE),
            reminders: vec![Reminder {
                method: ReminderMethod::Popup,
                minutes: REMINDER_MINUTES,
            }],
            use_default_reminders: false,
            private_properties,
        }
    }

    pub fn is_owned(&self) -> bool {
        is_owned(&self.private_properties)
    }
}

/// True when the private properties carry the gesync ownership tag.
pub fn is_owned(private_properties: &BTreeMap<String, String>) -> bool {
    private_properties
        .get(OWNERSHIP_KEY)
        .is_some_and(|v| v == OWNERSHIP_VALUE)
}

/// Attach a zone to a naive wall-clock time.
///
/// Ambiguous times (clocks going back) resolve to the earliest instant.
/// Times inside a DST gap are read with the offset in force before the gap.
pub fn localize<T: TimeZone>(naive: NaiveDateTime, tz: &T) -> DateTime<T> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(naive - TimeDelta::days(1)))
                .fix();
            let utc = naive - TimeDelta::seconds(i64::from(before.local_minus_utc()));
            tz.from_utc_datetime(&utc)
        }
    }
}
