//! `multipart/mixed` batch requests for the Google Calendar API.
//!
//! Each operation travels as an `application/http` part with its own
//! `Content-ID`. The response carries one part per operation, tagged
//! `response-<content id>`, in no guaranteed order.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;

use gesync_core::{SyncError, SyncResult};

/// Google rejects batches with more calls than this.
pub const MAX_BATCH_SIZE: usize = 50;

/// Path prefix of calendar API calls inside a batch.
pub const API_PATH: &str = "/calendar/v3";

/// One call inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    pub method: Method,
    /// Absolute path, e.g. `/calendar/v3/calendars/{id}/events`
    pub path: String,
    pub body: Option<Value>,
}

impl BatchOperation {
    pub fn delete_event(calendar_id: &str, event_id: &str) -> Self {
        BatchOperation {
            method: Method::DELETE,
            path: format!(
                "{}/calendars/{}/events/{}",
                API_PATH,
                urlencoding::encode(calendar_id),
                urlencoding::encode(event_id)
            ),
            body: None,
        }
    }

    pub fn insert_event(calendar_id: &str, event: Value) -> Self {
        BatchOperation {
            method: Method::POST,
            path: format!(
                "{}/calendars/{}/events",
                API_PATH,
                urlencoding::encode(calendar_id)
            ),
            body: Some(event),
        }
    }
}

/// HTTP response for one part of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResponse {
    pub status: u16,
    pub body: String,
}

impl PartResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Encode `operations` as a multipart body. Part `i` gets `Content-ID: <item-i>`.
pub fn encode_request(boundary: &str, operations: &[BatchOperation]) -> String {
    let mut out = String::new();

    for (i, op) in operations.iter().enumerate() {
        out.push_str(&format!("--{}\r\n", boundary));
        out.push_str("Content-Type: application/http\r\n");
        out.push_str(&format!("Content-ID: <item-{}>\r\n\r\n", i));
        out.push_str(&format!("{} {} HTTP/1.1\r\n", op.method, op.path));

        match &op.body {
            Some(body) => {
                out.push_str("Content-Type: application/json; charset=UTF-8\r\n\r\n");
                out.push_str(&body.to_string());
                out.push_str("\r\n");
            }
            None => out.push_str("\r\n"),
        }
    }

    out.push_str(&format!("--{}--\r\n", boundary));
    out
}

/// Decode a batch response into per-item responses, indexed like the request.
///
/// Items the server did not answer come back as `None`.
pub fn decode_response(
    content_type: &str,
    body: &str,
    item_count: usize,
) -> SyncResult<Vec<Option<PartResponse>>> {
    let boundary = boundary_param(content_type).ok_or_else(|| {
        SyncError::Transport(format!(
            "Batch response has no multipart boundary (Content-Type: {})",
            content_type
        ))
    })?;

    let body = body.replace("\r\n", "\n");
    let delimiter = format!("--{}", boundary);
    let mut by_item: HashMap<usize, PartResponse> = HashMap::new();

    for chunk in body.split(&delimiter).skip(1) {
        if chunk.starts_with("--") {
            break;
        }

        let Some((part_headers, http)) = split_head(chunk.trim_start_matches('\n')) else {
            continue;
        };
        let Some(index) = header(part_headers, "content-id").and_then(item_index) else {
            continue;
        };
        let Some(response) = parse_http_response(http) else {
            continue;
        };

        by_item.insert(index, response);
    }

    Ok((0..item_count).map(|i| by_item.remove(&i)).collect())
}

/// Random-enough boundary for one request.
pub fn new_boundary() -> String {
    format!("batch_gesync_{}", uuid::Uuid::new_v4().simple())
}

fn boundary_param(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (name, value) = param.split_once('=')?;
            name.trim()
                .eq_ignore_ascii_case("boundary")
                .then(|| value.trim().trim_matches('"'))
        })
        .filter(|b| !b.is_empty())
}

/// Split at the first blank line.
fn split_head(s: &str) -> Option<(&str, &str)> {
    s.split_once("\n\n")
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// `<response-item-3>` → 3
fn item_index(content_id: &str) -> Option<usize> {
    content_id
        .trim_matches(|c| c == '<' || c == '>')
        .trim_start_matches("response-")
        .strip_prefix("item-")?
        .parse()
        .ok()
}

fn parse_http_response(http: &str) -> Option<PartResponse> {
    let (head, body) = split_head(http).unwrap_or((http, ""));
    let status_line = head.lines().next()?;
    let status = status_line.split_whitespace().nth(1)?.parse().ok()?;

    Some(PartResponse {
        status,
        body: body.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_delete_and_insert() {
        let ops = vec![
            BatchOperation::delete_event("cal#1@group", "evt1"),
            BatchOperation::insert_event("cal#1@group", json!({"summary": "Algebra"})),
        ];

        let body = encode_request("XYZ", &ops);

        assert_eq!(
            body,
            "--XYZ\r\n\
             Content-Type: application/http\r\n\
             Content-ID: <item-0>\r\n\r\n\
             DELETE /calendar/v3/calendars/cal%231%40group/events/evt1 HTTP/1.1\r\n\r\n\
             --XYZ\r\n\
             Content-Type: application/http\r\n\
             Content-ID: <item-1>\r\n\r\n\
             POST /calendar/v3/calendars/cal%231%40group/events HTTP/1.1\r\n\
             Content-Type: application/json; charset=UTF-8\r\n\r\n\
             {\"summary\":\"Algebra\"}\r\n\
             --XYZ--\r\n"
        );
    }

    #[test]
    fn test_decode_out_of_order_parts() {
        let body = "--batch_abc\r\n\
            Content-Type: application/http\r\n\
            Content-ID: <response-item-1>\r\n\r\n\
            HTTP/1.1 410 Gone\r\n\
            Content-Type: application/json\r\n\r\n\
            {\"error\": {\"code\": 410, \"message\": \"Resource has been deleted\"}}\r\n\
            --batch_abc\r\n\
            Content-Type: application/http\r\n\
            Content-ID: <response-item-0>\r\n\r\n\
            HTTP/1.1 204 No Content\r\n\
            Content-Length: 0\r\n\r\n\r\n\
            --batch_abc--\r\n";

        let parts = decode_response("multipart/mixed; boundary=batch_abc", body, 3).unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(
            parts[0],
            Some(PartResponse {
                status: 204,
                body: String::new()
            })
        );
        let gone = parts[1].as_ref().unwrap();
        assert_eq!(gone.status, 410);
        assert!(gone.body.contains("Resource has been deleted"));
        assert!(parts[2].is_none());
    }

    #[test]
    fn test_decode_quoted_boundary() {
        let body = "--b1\nContent-ID: <response-item-0>\n\nHTTP/1.1 200 OK\n\n{\"id\":\"x\"}\n--b1--";
        let parts = decode_response("multipart/mixed; boundary=\"b1\"", body, 1).unwrap();
        assert_eq!(parts[0].as_ref().unwrap().body, "{\"id\":\"x\"}");
    }

    #[test]
    fn test_decode_without_boundary_fails() {
        assert!(decode_response("application/json", "{}", 1).is_err());
    }

    #[test]
    fn test_item_index() {
        assert_eq!(item_index("<response-item-12>"), Some(12));
        assert_eq!(item_index("<item-3>"), Some(3));
        assert_eq!(item_index("<response-other>"), None);
    }
}
