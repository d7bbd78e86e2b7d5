//! Anti-forgery token scraping.

use once_cell::sync::Lazy;
use regex::Regex;

use gesync_core::{SyncError, SyncResult};

/// Form field (and hidden input name) carrying the token.
pub const TOKEN_FIELD: &str = "__RequestVerificationToken";

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<input\sname="__RequestVerificationToken"\stype="hidden"\svalue="([a-zA-Z0-9_-]+)" />"#,
    )
    .expect("TOKEN_RE pattern is valid")
});

/// Pull the anti-forgery token out of the agenda page.
pub fn extract_token(html: &str) -> SyncResult<String> {
    TOKEN_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            SyncError::Protocol(format!(
                "{} not found in portal page (markup changed or login redirected)",
                TOKEN_FIELD
            ))
        })
}
