//! Typed decoding of the portal's JSON payloads.
//!
//! Unknown fields are ignored. `Title`, `DateDebut` and `DateFin` are
//! required; the other projected fields default to empty.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use gesync_core::SourceEvent;

const PORTAL_DATETIME_FORMATS: [&str; 2] = ["%Y/%m/%d %H:%M", "%Y/%m/%d %H:%M:%S"];

/// One program the student is enrolled in.
#[derive(Debug, Clone, Deserialize)]
pub struct Formation {
    #[serde(rename = "idForm")]
    id: serde_json::Value,
}

impl Formation {
    /// The id as sent back in form fields (numbers and strings both occur).
    pub fn id(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// A raw schedule record from `getEventInPeriode`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "DateDebut", deserialize_with = "portal_datetime")]
    pub start: NaiveDateTime,
    #[serde(rename = "DateFin", deserialize_with = "portal_datetime")]
    pub end: NaiveDateTime,
    #[serde(rename = "Local", default)]
    pub location: Option<String>,
    #[serde(rename = "Enseignant", default)]
    pub instructor: Option<String>,
    #[serde(rename = "Cours", default)]
    pub course: Option<String>,
    #[serde(rename = "LibelleType", default)]
    pub kind_label: Option<String>,
    #[serde(rename = "TypeCPE", default)]
    pub kind_code: Option<String>,
    #[serde(rename = "IsAllDay", default)]
    pub is_all_day: Option<bool>,
}

impl RawEvent {
    pub fn course_name(&self) -> &str {
        self.course.as_deref().unwrap_or_default().trim()
    }
}

impl From<RawEvent> for SourceEvent {
    fn from(raw: RawEvent) -> Self {
        SourceEvent {
            title: raw.title,
            course_code: raw.course.unwrap_or_default().trim().to_string(),
            instructor: raw.instructor.unwrap_or_default(),
            location: raw.location.unwrap_or_default(),
            start_local: raw.start,
            end_local: raw.end,
            event_kind: raw.kind_label.unwrap_or_default(),
            kind_code: raw.kind_code.unwrap_or_default(),
            is_all_day: raw.is_all_day.unwrap_or(false),
        }
    }
}

fn portal_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_portal_datetime(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid portal timestamp '{}', expected YYYY/MM/DD HH:MM", raw))
    })
}

pub fn parse_portal_datetime(raw: &str) -> Option<NaiveDateTime> {
    PORTAL_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
}
