//! Thin REST client for the Google Calendar v3 endpoints gesync uses.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use gesync_core::constants::{OWNERSHIP_KEY, OWNERSHIP_VALUE};
use gesync_core::{SyncError, SyncResult};

use crate::batch::{self, BatchOperation, PartResponse};
use crate::types::{CalendarListPage, EventsPage, error_message};

pub const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
pub const BATCH_URL: &str = "https://www.googleapis.com/batch/calendar/v3";

/// Largest page Google returns for event listings.
const PAGE_SIZE: &str = "250";

pub struct GoogleClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
    batch_url: String,
}

impl GoogleClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_endpoints(access_token, API_BASE, BATCH_URL)
    }

    /// Client pointed at other endpoints (a local mock server in tests).
    pub fn with_endpoints(
        access_token: impl Into<String>,
        api_base: impl Into<String>,
        batch_url: impl Into<String>,
    ) -> Self {
        GoogleClient {
            http: reqwest::Client::new(),
            access_token: access_token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            batch_url: batch_url.into(),
        }
    }

    /// One page of the user's calendar list.
    pub async fn calendar_list_page(&self, cursor: Option<&str>) -> SyncResult<CalendarListPage> {
        let url = format!("{}/users/me/calendarList", self.api_base);

        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        read_json(response, "calendar list").await
    }

    /// One page of gesync-tagged events ending after `time_min`.
    ///
    /// Recurring events come back as their master entries and deleted
    /// events are skipped.
    pub async fn events_page(
        &self,
        calendar_id: &str,
        time_min: DateTime<FixedOffset>,
        cursor: Option<&str>,
    ) -> SyncResult<EventsPage> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(calendar_id)
        );

        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
        let tag = format!("{}={}", OWNERSHIP_KEY, OWNERSHIP_VALUE);

        let mut query: Vec<(&str, &str)> = vec![
            ("timeMin", time_min.as_str()),
            ("showDeleted", "false"),
            ("singleEvents", "false"),
            ("maxResults", PAGE_SIZE),
            ("privateExtendedProperty", tag.as_str()),
        ];
        if let Some(token) = cursor {
            query.push(("pageToken", token));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await
            .map_err(transport)?;

        read_json(response, "event list").await
    }

    /// Send up to [`batch::MAX_BATCH_SIZE`] operations in one request.
    ///
    /// The result is aligned with `operations`; `None` marks an item the
    /// server left unanswered.
    pub async fn batch(
        &self,
        operations: &[BatchOperation],
    ) -> SyncResult<Vec<Option<PartResponse>>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let boundary = batch::new_boundary();
        let body = batch::encode_request(&boundary, operations);

        debug!(items = operations.len(), "Sending batch request");

        let response = self
            .http
            .post(&self.batch_url)
            .bearer_auth(&self.access_token)
            .header(
                CONTENT_TYPE,
                format!("multipart/mixed; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(SyncError::Transport(format!(
                "Batch request failed ({}): {}",
                status,
                error_message(&text).unwrap_or(text)
            )));
        }

        batch::decode_response(&content_type, &text, operations.len())
    }
}

fn transport(e: reqwest::Error) -> SyncError {
    SyncError::Transport(e.to_string())
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> SyncResult<T> {
    let status = response.status();
    let text = response.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(SyncError::Transport(format!(
            "Failed to fetch {} ({}): {}",
            what,
            status,
            error_message(&text).unwrap_or(text)
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| SyncError::Decode(format!("Failed to parse {}: {}", what, e)))
}
