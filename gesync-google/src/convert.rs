//! Mirror events to Google's representation.

use gesync_core::{MirrorEvent, ReminderMethod};

use crate::types::{EventDateTime, ExtendedProperties, GoogleEvent, ReminderOverride, Reminders};

pub trait ToGoogle {
    fn to_google(&self) -> GoogleEvent;
}

impl ToGoogle for MirrorEvent {
    fn to_google(&self) -> GoogleEvent {
        let zone = self.start.timezone().name().to_string();

        GoogleEvent {
            id: self.remote_id.clone(),
            summary: Some(self.title.clone()),
            location: self.location.clone(),
            start: Some(EventDateTime {
                date_time: Some(self.start.to_rfc3339()),
                date: None,
                time_zone: Some(zone.clone()),
            }),
            end: Some(EventDateTime {
                date_time: Some(self.end.to_rfc3339()),
                date: None,
                time_zone: Some(zone),
            }),
            reminders: Some(Reminders {
                use_default: self.use_default_reminders,
                overrides: self
                    .reminders
                    .iter()
                    .map(|r| ReminderOverride {
                        method: match r.method {
                            ReminderMethod::Popup => "popup".to_string(),
                            ReminderMethod::Email => "email".to_string(),
                        },
                        minutes: r.minutes,
                    })
                    .collect(),
            }),
            extended_properties: Some(ExtendedProperties {
                private: self.private_properties.clone(),
                shared: Default::default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gesync_core::SourceEvent;
    use serde_json::json;

    #[test]
    fn test_algebra_lecture_wire_format() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let source = SourceEvent {
            title: "Algebra".to_string(),
            course_code: "MATH101".to_string(),
            instructor: String::new(),
            location: "Room 5".to_string(),
            start_local: start,
            end_local: start + chrono::TimeDelta::minutes(90),
            event_kind: String::new(),
            kind_code: String::new(),
            is_all_day: false,
        };

        let google = MirrorEvent::from_source(&source).to_google();

        assert_eq!(
            serde_json::to_value(&google).unwrap(),
            json!({
                "summary": "Algebra",
                "location": "Room 5",
                "start": {"dateTime": "2024-03-04T09:00:00+01:00", "timeZone": "Europe/Luxembourg"},
                "end": {"dateTime": "2024-03-04T10:30:00+01:00", "timeZone": "Europe/Luxembourg"},
                "reminders": {"useDefault": false, "overrides": [{"method": "popup", "minutes": 15}]},
                "extendedProperties": {"private": {"sync-application": "gesync"}}
            })
        );
    }
}
