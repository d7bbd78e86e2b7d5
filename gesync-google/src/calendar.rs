//! Google Calendar behind the sync engine's calendar seam.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

use gesync_core::sync::{CalendarLogin, CalendarTarget};
use gesync_core::{BatchReport, SourceEvent, SyncResult};

use crate::api::{API_BASE, BATCH_URL, GoogleClient};
use crate::app_config::{self, AppCredentials};
use crate::session::{GoogleSession, TOKEN_URL};
use crate::{directory, mirror};

/// Stored Google credentials, not yet turned into a live session.
#[derive(Debug, Clone)]
pub struct GoogleAccount {
    dir: PathBuf,
    token_url: String,
    api_base: String,
    batch_url: String,
}

impl GoogleAccount {
    /// Account backed by the files in the default config directory.
    pub fn from_config_dir() -> SyncResult<Self> {
        Ok(Self::in_dir(app_config::base_dir()?))
    }

    pub fn in_dir(dir: PathBuf) -> Self {
        GoogleAccount {
            dir,
            token_url: TOKEN_URL.to_string(),
            api_base: API_BASE.to_string(),
            batch_url: BATCH_URL.to_string(),
        }
    }

    /// Point the account at other Google endpoints.
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
        batch_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self.batch_url = batch_url.into();
        self
    }
}

impl CalendarLogin for GoogleAccount {
    type Target = GoogleCalendar;

    async fn login(&self) -> SyncResult<GoogleCalendar> {
        let creds = AppCredentials::load(&self.dir)?;
        let session =
            GoogleSession::load_valid(&GoogleSession::path_in(&self.dir), &creds, &self.token_url)
                .await?;

        Ok(GoogleCalendar {
            client: GoogleClient::with_endpoints(
                session.access_token(),
                self.api_base.as_str(),
                self.batch_url.as_str(),
            ),
        })
    }
}

/// An authenticated Google Calendar connection.
pub struct GoogleCalendar {
    client: GoogleClient,
}

impl CalendarTarget for GoogleCalendar {
    async fn resolve(&self, name: &str) -> SyncResult<String> {
        directory::resolve_calendar(&self.client, name).await
    }

    async fn clear_window(
        &self,
        calendar_id: &str,
        window_start: DateTime<FixedOffset>,
    ) -> SyncResult<BatchReport> {
        mirror::clear_window(&self.client, calendar_id, window_start).await
    }

    async fn insert_events(
        &self,
        calendar_id: &str,
        events: &[SourceEvent],
    ) -> SyncResult<BatchReport> {
        mirror::insert_events(&self.client, calendar_id, events).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use gesync_core::SyncError;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::session::SessionData;

    fn account_with_session(server: &MockServer) -> (tempfile::TempDir, GoogleAccount) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app_config.toml"),
            "client_id = \"cid\"\nclient_secret = \"cs\"\n",
        )
        .unwrap();
        GoogleSession::new(
            GoogleSession::path_in(dir.path()),
            SessionData {
                access_token: "live-token".to_string(),
                refresh_token: "r".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        )
        .save()
        .unwrap();

        let account = GoogleAccount::in_dir(dir.path().to_path_buf()).with_endpoints(
            format!("{}/token", server.uri()),
            format!("{}/calendar/v3", server.uri()),
            format!("{}/batch/calendar/v3", server.uri()),
        );
        (dir, account)
    }

    #[tokio::test]
    async fn test_login_uses_stored_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/users/me/calendarList"))
            .and(header("authorization", "Bearer live-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "uni@group", "summary": "University"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, account) = account_with_session(&server);
        let calendar = account.login().await.unwrap();

        assert_eq!(calendar.resolve("University").await.unwrap(), "uni@group");
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GoogleAccount::in_dir(dir.path().to_path_buf())
            .login()
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
