//! Authenticated session with the Guichet Etudiant portal.

use reqwest::{Response, StatusCode};
use tracing::debug;

use gesync_core::{SyncError, SyncResult};

use crate::ntlm::NtlmCredentials;
use crate::token::{TOKEN_FIELD, extract_token};
use crate::transport::NtlmClient;

/// Base URL of the student portal.
pub const DEFAULT_BASE_URL: &str = "https://inscription.uni.lu/Inscriptions/Student/GuichetEtudiant";

const AGENDA_PATH: &str = "/Agenda";

/// An NTLM-authenticated portal session plus its anti-forgery token.
pub struct PortalSession {
    client: NtlmClient,
    base_url: String,
    token: String,
}

impl PortalSession {
    /// Log in and scrape the anti-forgery token from the agenda page.
    ///
    /// A 401 on the agenda page is the only bad-credentials signal.
    pub async fn authenticate(base_url: &str, username: &str, password: &str) -> SyncResult<Self> {
        let client = NtlmClient::new(NtlmCredentials::new(username, password))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let url = format!("{}{}", base_url, AGENDA_PATH);
        let response = client.send(client.get(&url)).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Authentication(
                "Wrong username/password supplied.".into(),
            ));
        }

        let html = success_body(response).await?;
        let token = extract_token(&html)?;
        debug!(base_url = %base_url, "portal session established");

        Ok(PortalSession {
            client,
            base_url,
            token,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// POST a form to `path`, adding the anti-forgery token unless the
    /// caller already supplied a non-empty one.
    pub async fn post_form(&self, path: &str, mut form: Vec<(String, String)>) -> SyncResult<String> {
        let has_token = form
            .iter()
            .any(|(k, v)| k == TOKEN_FIELD && !v.is_empty());
        if !has_token {
            form.retain(|(k, _)| k != TOKEN_FIELD);
            form.push((TOKEN_FIELD.to_string(), self.token.clone()));
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "portal POST");

        let response = self.client.send(self.client.post(&url).form(&form)).await?;
        success_body(response).await
    }
}

async fn success_body(response: Response) -> SyncResult<String> {
    let status = response.status();
    let url = response.url().clone();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Transport(format!(
            "Portal request to {} failed ({}): {}",
            url,
            status,
            body.chars().take(200).collect::<String>()
        )));
    }

    response
        .text()
        .await
        .map_err(|e| SyncError::Transport(format!("Failed to read portal response: {}", e)))
}
