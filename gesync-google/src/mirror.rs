//! Tagged-mirror operations on one calendar: wipe the window, insert events.
//!
//! Only events carrying the `sync-application=gesync` private property are
//! ever deleted. Both operations run as batches of at most
//! [`MAX_BATCH_SIZE`] calls; a failing item never aborts its siblings.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveTime};
use tracing::{debug, info, warn};

use gesync_core::constants::PORTAL_TIMEZONE;
use gesync_core::event::{is_owned, localize};
use gesync_core::{BatchReport, ItemOutcome, MirrorEvent, SourceEvent, SyncError, SyncResult};

use crate::api::GoogleClient;
use crate::batch::{BatchOperation, MAX_BATCH_SIZE, PartResponse};
use crate::convert::ToGoogle;
use crate::types::{EventDateTime, GoogleEvent, error_message};

/// Ids of tagged events on `calendar_id` that start at or after `window_start`.
///
/// Google's `timeMin` filters on end time, so the start is checked again
/// here. Events whose start cannot be read are left alone.
pub async fn owned_events_in_window(
    client: &GoogleClient,
    calendar_id: &str,
    window_start: DateTime<FixedOffset>,
) -> SyncResult<Vec<String>> {
    let mut ids = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .events_page(calendar_id, window_start, cursor.as_deref())
            .await?;

        for event in page.items {
            if !event.private_properties().is_some_and(is_owned) {
                continue;
            }
            let Some(start) = event.start.as_ref().and_then(event_start) else {
                continue;
            };
            if start < window_start {
                continue;
            }
            match event.id {
                Some(id) if seen.insert(id.clone()) => ids.push(id),
                _ => {}
            }
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => cursor = Some(token),
            _ => break,
        }
    }

    debug!(calendar = calendar_id, count = ids.len(), "Listed owned events");
    Ok(ids)
}

/// Delete every tagged event in the window.
pub async fn clear_window(
    client: &GoogleClient,
    calendar_id: &str,
    window_start: DateTime<FixedOffset>,
) -> SyncResult<BatchReport> {
    let ids = owned_events_in_window(client, calendar_id, window_start).await?;
    let mut report = BatchReport::empty();

    for chunk in ids.chunks(MAX_BATCH_SIZE) {
        let ops: Vec<BatchOperation> = chunk
            .iter()
            .map(|id| BatchOperation::delete_event(calendar_id, id))
            .collect();

        let parts = client.batch(&ops).await?;

        for (id, part) in chunk.iter().zip(parts) {
            let outcome = delete_outcome(id, part);
            if let ItemOutcome::Failed {
                status, message, ..
            } = &outcome
            {
                warn!(event = %id, status, "Failed to delete event: {}", message);
            }
            report.outcomes.push(outcome);
        }
    }

    info!(
        calendar = calendar_id,
        removed = report.succeeded(),
        failed = report.failed(),
        "Cleared sync window"
    );
    Ok(report)
}

/// Insert a tagged mirror of each source event.
pub async fn insert_events(
    client: &GoogleClient,
    calendar_id: &str,
    events: &[SourceEvent],
) -> SyncResult<BatchReport> {
    let mut report = BatchReport::empty();

    for chunk in events.chunks(MAX_BATCH_SIZE) {
        let mut ops = Vec::with_capacity(chunk.len());
        for source in chunk {
            let body = serde_json::to_value(MirrorEvent::from_source(source).to_google())
                .map_err(|e| SyncError::Decode(e.to_string()))?;
            ops.push(BatchOperation::insert_event(calendar_id, body));
        }

        let parts = client.batch(&ops).await?;

        for (source, part) in chunk.iter().zip(parts) {
            let outcome = insert_outcome(part);
            if let ItemOutcome::Failed {
                status, message, ..
            } = &outcome
            {
                warn!(title = %source.title, status, "Failed to insert event: {}", message);
            }
            report.outcomes.push(outcome);
        }
    }

    info!(
        calendar = calendar_id,
        inserted = report.succeeded(),
        failed = report.failed(),
        "Inserted events"
    );
    Ok(report)
}

fn delete_outcome(id: &str, part: Option<PartResponse>) -> ItemOutcome {
    let id = Some(id.to_string());
    match part {
        Some(p) if p.is_success() => ItemOutcome::Ok { id },
        Some(p) if p.status == 410 => ItemOutcome::AlreadyGone { id },
        Some(p) => ItemOutcome::Failed {
            id,
            status: p.status,
            message: error_message(&p.body).unwrap_or(p.body),
        },
        None => missing(id),
    }
}

fn insert_outcome(part: Option<PartResponse>) -> ItemOutcome {
    match part {
        Some(p) if p.is_success() => {
            let id = serde_json::from_str::<GoogleEvent>(&p.body)
                .ok()
                .and_then(|e| e.id);
            ItemOutcome::Ok { id }
        }
        Some(p) if p.status == 410 => ItemOutcome::AlreadyGone { id: None },
        Some(p) => ItemOutcome::Failed {
            id: None,
            status: p.status,
            message: error_message(&p.body).unwrap_or(p.body),
        },
        None => missing(None),
    }
}

fn missing(id: Option<String>) -> ItemOutcome {
    ItemOutcome::Failed {
        id,
        status: 0,
        message: "No response for this item in batch reply".to_string(),
    }
}

/// Start instant of a Google event. All-day events start at local midnight.
fn event_start(start: &EventDateTime) -> Option<DateTime<FixedOffset>> {
    if let Some(dt) = &start.date_time {
        return DateTime::parse_from_rfc3339(dt).ok();
    }

    let date = chrono::NaiveDate::parse_from_str(start.date.as_deref()?, "%Y-%m-%d").ok()?;
    let midnight = localize(date.and_time(NaiveTime::MIN), &PORTAL_TIMEZONE);
    Some(midnight.fixed_offset())
}
