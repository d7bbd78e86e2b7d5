//! Interactive OAuth consent flow with a loopback redirect.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::app_config::AppCredentials;
use crate::session::{GoogleSession, SessionData, TOKEN_URL, TokenResponse};

pub const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

const REDIRECT_PORT: u16 = 8085;

pub fn redirect_uri() -> String {
    format!("http://localhost:{}/callback", REDIRECT_PORT)
}

pub fn redirect_address() -> String {
    format!("127.0.0.1:{}", REDIRECT_PORT)
}

pub fn consent_url(creds: &AppCredentials, state: &str) -> Result<url::Url> {
    let url = url::Url::parse_with_params(
        AUTH_URL,
        &[
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri().as_str()),
            ("response_type", "code"),
            ("scope", SCOPES.join(" ").as_str()),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )?;
    Ok(url)
}

/// Run the consent flow and store the resulting session in `dir`.
pub async fn authenticate(dir: &Path) -> Result<()> {
    let creds = AppCredentials::load(dir)?;
    let state = uuid::Uuid::new_v4().simple().to_string();
    let auth_url = consent_url(&creds, &state)?;

    println!("\nOpen this URL in your browser to authenticate:\n");
    println!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(auth_url.as_str()).is_err() {
        println!("(Could not open browser automatically, please copy the URL above)");
    }

    let listener = TcpListener::bind(redirect_address())
        .await
        .context("Failed to bind OAuth callback listener")?;
    let (code, returned_state) = wait_for_callback(&listener).await?;

    if returned_state != state {
        anyhow::bail!("OAuth state mismatch, refusing the callback");
    }

    println!("\nReceived authorization code, exchanging for tokens...");

    let data = exchange_code(&creds, &code, TOKEN_URL).await?;
    GoogleSession::new(GoogleSession::path_in(dir), data).save()?;

    println!("Authentication successful!");
    Ok(())
}

/// Trade an authorization code for tokens.
pub async fn exchange_code(
    creds: &AppCredentials,
    code: &str,
    token_url: &str,
) -> Result<SessionData> {
    let redirect = redirect_uri();

    let response = reqwest::Client::new()
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("redirect_uri", redirect.as_str()),
        ])
        .send()
        .await
        .context("Failed to send token request to Google")?;

    if !response.status().is_success() {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Failed to exchange authorization code: {}", error_text);
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response from Google")?;

    let refresh_token = tokens
        .refresh_token
        .filter(|t| !t.is_empty())
        .context("Google did not return a refresh token")?;

    Ok(SessionData::from_tokens(
        tokens.access_token,
        refresh_token,
        tokens.expires_in,
    ))
}

async fn wait_for_callback(listener: &TcpListener) -> Result<(String, String)> {
    let (stream, _) = listener
        .accept()
        .await
        .context("Failed to accept OAuth callback")?;

    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .await
        .context("Failed to read OAuth callback request line")?;

    let parsed = parse_callback(&request_line);

    let (status, message) = match &parsed {
        Ok(_) => (
            "200 OK",
            "<h1>Authentication successful!</h1>\
             <p>You can close this window and return to the terminal.</p>",
        ),
        Err(_) => (
            "400 Bad Request",
            "<h1>Authentication failed</h1>\
             <p>Check the terminal for details.</p>",
        ),
    };
    let response = format!(
        "HTTP/1.1 {}\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>{}</body></html>",
        status, message
    );

    let mut stream = reader.into_inner();
    stream
        .write_all(response.as_bytes())
        .await
        .context("Failed to write OAuth callback response")?;
    stream.flush().await?;

    parsed
}

/// Pull `code` and `state` out of `GET /callback?code=..&state=.. HTTP/1.1`.
fn parse_callback(request_line: &str) -> Result<(String, String)> {
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("Invalid HTTP request"))?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    };

    if let Some(error) = param("error") {
        anyhow::bail!("Google denied access: {}", error);
    }

    let code = param("code").ok_or_else(|| anyhow::anyhow!("No code in callback"))?;
    let state = param("state").ok_or_else(|| anyhow::anyhow!("No state in callback"))?;

    Ok((code, state))
}
