//! HTTP client that answers NTLM challenges at the transport layer.
//!
//! Callers build ordinary requests; when the server replies 401 and
//! offers NTLM, the request is replayed through the three-message
//! handshake on the same keep-alive connection. Credentials are bound
//! to the client, not to individual requests.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode};
use tracing::debug;

use gesync_core::{SyncError, SyncResult};

use crate::ntlm::{self, Challenge, NtlmCredentials};

const SCHEMES: [&str; 2] = ["NTLM", "Negotiate"];

pub struct NtlmClient {
    http: Client,
    credentials: NtlmCredentials,
}

impl NtlmClient {
    pub fn new(credentials: NtlmCredentials) -> SyncResult<Self> {
        // NTLM authenticates a connection, so stay on HTTP/1.1 keep-alive.
        let http = Client::builder()
            .cookie_store(true)
            .http1_only()
            .build()
            .map_err(|e| SyncError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(NtlmClient { http, credentials })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.http.get(url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.http.post(url)
    }

    /// Send a request, completing an NTLM handshake if the server asks for one.
    ///
    /// A 401 that survives the handshake is returned as-is so the caller
    /// can decide what it means.
    pub async fn send(&self, builder: RequestBuilder) -> SyncResult<Response> {
        let request = builder.build().map_err(transport)?;
        let url = request.url().clone();
        let template = request.try_clone();

        let response = self.http.execute(request).await.map_err(transport)?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let Some(scheme) = offered_scheme(&response) else {
            return Ok(response);
        };
        let Some(template) = template else {
            // Streaming bodies cannot be replayed
            return Ok(response);
        };
        drain(response).await;

        debug!(%url, scheme, "answering NTLM challenge");

        let negotiate = with_token(&template, scheme, &ntlm::negotiate_message())?;
        let response = self.http.execute(negotiate).await.map_err(transport)?;

        let challenge = match challenge_from(&response, scheme) {
            Some(bytes) => Challenge::parse(&bytes)
                .map_err(|e| SyncError::Protocol(format!("Invalid NTLM challenge: {}", e)))?,
            None => return Ok(response),
        };
        drain(response).await;

        let authenticate = ntlm::authenticate_message(
            &self.credentials,
            &challenge,
            rand::random::<[u8; 8]>(),
            ntlm::filetime_now(),
        );
        let request = with_token(&template, scheme, &authenticate)?;

        self.http.execute(request).await.map_err(transport)
    }
}

fn transport(e: reqwest::Error) -> SyncError {
    SyncError::Transport(e.to_string())
}

/// The NTLM-family scheme the server advertises, if any.
fn offered_scheme(response: &Response) -> Option<&'static str> {
    let offered: Vec<&str> = response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    SCHEMES.into_iter().find(|scheme| {
        offered
            .iter()
            .any(|v| v.split_whitespace().next().is_some_and(|s| s.eq_ignore_ascii_case(scheme)))
    })
}

/// Decoded challenge bytes from a `WWW-Authenticate: <scheme> <base64>` header.
fn challenge_from(response: &Response, scheme: &str) -> Option<Vec<u8>> {
    if response.status() != StatusCode::UNAUTHORIZED {
        return None;
    }

    response
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split_once(' '))
        .find(|(s, _)| s.eq_ignore_ascii_case(scheme))
        .and_then(|(_, token)| STANDARD.decode(token.trim()).ok())
}

fn with_token(template: &Request, scheme: &str, message: &[u8]) -> SyncResult<Request> {
    let mut request = template
        .try_clone()
        .ok_or_else(|| SyncError::Transport("Request body cannot be replayed".into()))?;

    let value = HeaderValue::from_str(&format!("{} {}", scheme, STANDARD.encode(message)))
        .map_err(|e| SyncError::Protocol(format!("Invalid authorization header: {}", e)))?;
    request.headers_mut().insert(AUTHORIZATION, value);

    Ok(request)
}

/// Read the body so the connection goes back to the pool for the next leg.
async fn drain(response: Response) {
    let _ = response.bytes().await;
}
