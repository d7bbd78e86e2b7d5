//! Calendar name → id lookup.

use tracing::debug;

use gesync_core::{SyncError, SyncResult};

use crate::api::GoogleClient;

/// Walk the user's calendar list until an entry's display name matches
/// `name` exactly.
pub async fn resolve_calendar(client: &GoogleClient, name: &str) -> SyncResult<String> {
    let mut cursor: Option<String> = None;

    loop {
        let page = client.calendar_list_page(cursor.as_deref()).await?;

        if let Some(entry) = page.items.into_iter().find(|c| c.summary == name) {
            debug!(calendar = name, id = %entry.id, "Resolved calendar");
            return Ok(entry.id);
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => cursor = Some(token),
            _ => return Err(SyncError::CalendarNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with_two_pages() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendar/v3/users/me/calendarList"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "primary@gmail.com", "summary": "primary@gmail.com"},
                    {"id": "work@group", "summary": "Work"}
                ],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/calendar/v3/users/me/calendarList"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": "uni@group", "summary": "University"}]
            })))
            .mount(&server)
            .await;

        server
    }

    fn client(server: &MockServer) -> GoogleClient {
        GoogleClient::with_endpoints(
            "t",
            format!("{}/calendar/v3", server.uri()),
            format!("{}/batch/calendar/v3", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_resolve_on_second_page() {
        let server = server_with_two_pages().await;
        let id = resolve_calendar(&client(&server), "University").await.unwrap();
        assert_eq!(id, "uni@group");
    }

    #[tokio::test]
    async fn test_resolve_is_exact_match() {
        let server = server_with_two_pages().await;
        let err = resolve_calendar(&client(&server), "university")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::CalendarNotFound(name) if name == "university"));
    }
}
