//! A valid Google session (access token) for calling the Calendar API.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use gesync_core::{SyncError, SyncResult};

use crate::app_config::AppCredentials;

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionData {
    pub fn from_tokens(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        SessionData {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }
}

/// Google's token endpoint reply, for both code exchange and refresh.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
}

pub struct GoogleSession {
    path: PathBuf,
    data: SessionData,
}

impl GoogleSession {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join("session.toml")
    }

    pub fn new(path: PathBuf, data: SessionData) -> Self {
        GoogleSession { path, data }
    }

    pub fn access_token(&self) -> &str {
        &self.data.access_token
    }

    // Load a session and refresh it if expired:
    pub async fn load_valid(
        path: &Path,
        creds: &AppCredentials,
        token_url: &str,
    ) -> SyncResult<Self> {
        let mut session = Self::load(path)?;

        if session.is_expired() {
            session.refresh(creds, token_url).await?;
        }

        Ok(session)
    }

    fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Google session not found at {}. Run `gesync auth` first.",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read Google session from {}: {}",
                path.display(),
                e
            ))
        })?;

        let data: SessionData = toml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse Google session from {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(GoogleSession {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn save(&self) -> SyncResult<()> {
        let contents = toml::to_string_pretty(&self.data)
            .map_err(|e| SyncError::Config(format!("Failed to serialize session: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&self.path, contents)?;

        // Owner-only (0600), the file holds OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn is_expired(&self) -> bool {
        Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.data.expires_at
    }

    async fn refresh(&mut self, creds: &AppCredentials, token_url: &str) -> SyncResult<()> {
        debug!("Refreshing Google access token");

        let response = reqwest::Client::new()
            .post(token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.data.refresh_token.as_str()),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to refresh token: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SyncError::Authentication(format!(
                "Google rejected the refresh token, run `gesync auth` again ({})",
                error_text.trim()
            )));
        }
        if !status.is_success() {
            return Err(SyncError::Transport(format!(
                "Token refresh failed with {}",
                status
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SyncError::Decode(format!("Failed to parse token response: {}", e)))?;

        // Google usually doesn't return a new refresh_token on refresh
        let refresh_token = tokens
            .refresh_token
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.data.refresh_token.clone());

        self.data = SessionData::from_tokens(tokens.access_token, refresh_token, tokens.expires_in);
        self.save()
    }
}
