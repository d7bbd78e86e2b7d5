//! Schedule retrieval from an authenticated portal session.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use gesync_core::sync::{EventSource, PortalLogin, course_names};
use gesync_core::{SourceEvent, SyncError, SyncResult};

use crate::records::{Formation, RawEvent};
use crate::session::PortalSession;

const FORMATION_PATH: &str = "/getStudentFormation";
const EVENTS_PATH: &str = "/getEventInPeriode";
const DATE_FORMAT: &str = "%Y-%m-%dT00:00:00";

/// Course allow-list. Empty means every course is kept.
#[derive(Debug, Clone, Default)]
pub struct CourseFilter(BTreeSet<String>);

impl CourseFilter {
    pub fn new<I, S>(courses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CourseFilter(
            courses
                .into_iter()
                .map(|c| c.as_ref().trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    pub fn allows(&self, course: &str) -> bool {
        self.0.is_empty() || self.0.contains(course.trim())
    }
}

pub struct PortalEventSource {
    session: PortalSession,
    filter: CourseFilter,
}

impl PortalEventSource {
    pub fn new(session: PortalSession, filter: CourseFilter) -> Self {
        PortalEventSource { session, filter }
    }

    /// Ids of every program the student is enrolled in.
    pub async fn student_formations(&self) -> SyncResult<Vec<String>> {
        let formations: Vec<Formation> = self.post_json(FORMATION_PATH, Vec::new()).await?;
        Ok(formations.iter().map(Formation::id).collect())
    }

    /// Every raw record in `[start, end)` for the given programs.
    pub async fn events_in_period(
        &self,
        formation_ids: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> SyncResult<Vec<RawEvent>> {
        let mut form = vec![
            ("start".to_string(), start.format(DATE_FORMAT).to_string()),
            ("end".to_string(), end.format(DATE_FORMAT).to_string()),
        ];
        form.extend(
            formation_ids
                .iter()
                .map(|id| ("formations".to_string(), id.clone())),
        );
        form.push(("groupFilter".to_string(), "all".to_string()));

        self.post_json(EVENTS_PATH, form).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Vec<(String, String)>,
    ) -> SyncResult<T> {
        let body = self.session.post_form(path, form).await?;
        serde_json::from_str(&body)
            .map_err(|e| SyncError::Decode(format!("Unexpected response from {}: {}", path, e)))
    }
}

impl EventSource for PortalEventSource {
    async fn get_events(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<Vec<SourceEvent>> {
        let formation_ids = self.student_formations().await?;
        debug!(count = formation_ids.len(), "student formations");

        let raw = self.events_in_period(&formation_ids, start, end).await?;
        let total = raw.len();

        let events: Vec<SourceEvent> = raw
            .into_iter()
            .filter(|e| self.filter.allows(e.course_name()))
            .map(SourceEvent::from)
            .collect();

        info!(
            total,
            kept = events.len(),
            courses = ?course_names(&events),
            "portal events retained"
        );

        Ok(events)
    }
}

/// Portal login details; logging in yields a [`PortalEventSource`].
#[derive(Clone)]
pub struct PortalAccount {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub courses: Vec<String>,
}

impl PortalLogin for PortalAccount {
    type Source = PortalEventSource;

    async fn login(&self) -> SyncResult<PortalEventSource> {
        let session =
            PortalSession::authenticate(&self.base_url, &self.username, &self.password).await?;
        Ok(PortalEventSource::new(
            session,
            CourseFilter::new(&self.courses),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AGENDA_HTML: &str =
        r#"<input name="__RequestVerificationToken" type="hidden" value="tok" />"#;

    async fn portal() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/Agenda"))
            .respond_with(ResponseTemplate::new(200).set_body_string(AGENDA_HTML))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/getStudentFormation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"[{"idForm": 11}, {"idForm": 12}]"#),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/getEventInPeriode"))
            .and(body_string_contains("start=2024-03-04T00%3A00%3A00"))
            .and(body_string_contains("end=2024-03-14T00%3A00%3A00"))
            .and(body_string_contains("formations=11&formations=12"))
            .and(body_string_contains("groupFilter=all"))
            .and(body_string_contains("__RequestVerificationToken=tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"Title": "Algebra", "Cours": "MATH101", "DateDebut": "2024/03/04 09:00",
                     "DateFin": "2024/03/04 10:30", "Local": "Room 5"},
                    {"Title": "Mechanics", "Cours": "PHYS201", "DateDebut": "2024/03/05 14:00",
                     "DateFin": "2024/03/05 16:00", "Local": "Lab 2"}
                ]"#,
            ))
            .mount(&server)
            .await;

        server
    }

    fn account(server: &MockServer, courses: &[&str]) -> PortalAccount {
        PortalAccount {
            base_url: server.uri(),
            username: "jdoe".to_string(),
            password: "pw".to_string(),
            courses: courses.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_filter_keeps_only_selected_courses() {
        let server = portal().await;
        let source = account(&server, &["MATH101"]).login().await.unwrap();

        let events = source
            .get_events(date(2024, 3, 4), date(2024, 3, 14))
            .await
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Algebra");
        assert_eq!(events[0].course_code, "MATH101");
    }

    #[tokio::test]
    async fn test_empty_filter_keeps_everything() {
        let server = portal().await;
        let source = account(&server, &[]).login().await.unwrap();

        let events = source
            .get_events(date(2024, 3, 4), date(2024, 3, 14))
            .await
            .unwrap();

        let titles: Vec<_> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Algebra", "Mechanics"]);
    }

    #[tokio::test]
    async fn test_malformed_event_payload_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Agenda"))
            .respond_with(ResponseTemplate::new(200).set_body_string(AGENDA_HTML))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/getStudentFormation"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"idForm": 1}]"#))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/getEventInPeriode"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"Title": "x"}]"#))
            .mount(&server)
            .await;

        let source = account(&server, &[]).login().await.unwrap();
        let result = source.get_events(date(2024, 3, 4), date(2024, 3, 14)).await;
        assert!(matches!(result, Err(SyncError::Decode(_))));
    }

    #[test]
    fn test_course_filter_trims_both_sides() {
        let filter = CourseFilter::new([" MATH101 "]);
        assert!(filter.allows("MATH101  "));
        assert!(!filter.allows("PHYS201"));
        assert!(CourseFilter::new(Vec::<String>::new()).allows("anything"));
    }
}
