//! Sync orchestration.
//!
//! One pass is strictly linear:
//! portal login → calendar login → resolve calendar → clear window →
//! [fetch → insert] → done. The bracketed tail is skipped in clear-only
//! mode. Any failure aborts the pass; nothing here retries.
//!
//! The portal and calendar sides are reached through the traits below so
//! the engine can be driven by in-memory fakes.

#![allow(async_fn_in_trait)]

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate};
use tracing::{debug, info};

use crate::batch::BatchReport;
use crate::error::SyncResult;
use crate::event::SourceEvent;
use crate::window::SyncWindow;

/// Something that can open an authenticated portal session.
pub trait PortalLogin {
    type Source: EventSource;

    async fn login(&self) -> SyncResult<Self::Source>;
}

/// An authenticated source of schedule entries.
pub trait EventSource {
    /// Entries in `[start, end)`, already filtered by the course allow-list.
    async fn get_events(&self, start: NaiveDate, end: NaiveDate) -> SyncResult<Vec<SourceEvent>>;
}

/// Something that can open an authenticated calendar session.
pub trait CalendarLogin {
    type Target: CalendarTarget;

    async fn login(&self) -> SyncResult<Self::Target>;
}

/// An authenticated calendar service.
pub trait CalendarTarget {
    /// Id of the calendar whose display name is exactly `name`.
    async fn resolve(&self, name: &str) -> SyncResult<String>;

    /// Delete every tagged event starting at or after `window_start`.
    async fn clear_window(
        &self,
        calendar_id: &str,
        window_start: DateTime<FixedOffset>,
    ) -> SyncResult<BatchReport>;

    /// Insert a tagged mirror of each event.
    async fn insert_events(
        &self,
        calendar_id: &str,
        events: &[SourceEvent],
    ) -> SyncResult<BatchReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Clear the window, then refill it from the portal
    Full,
    /// Only clear the window
    ClearOnly,
}

/// What a single pass should do.
#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub calendar_name: String,
    pub window: SyncWindow,
    pub mode: SyncMode,
}

/// Milestones reported while a pass runs.
#[derive(Debug)]
pub enum Progress<'a> {
    PortalAuthenticated,
    CalendarAuthenticated,
    CalendarResolved { calendar_id: &'a str },
    WindowCleared { report: &'a BatchReport },
    EventsFetched { events: &'a [SourceEvent] },
    EventsInserted { report: &'a BatchReport },
}

/// Summary of a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub calendar_id: String,
    pub cleared: BatchReport,
    /// `None` in clear-only mode
    pub inserted: Option<BatchReport>,
}

pub struct SyncOrchestrator<P, C> {
    portal: P,
    calendar: C,
}

impl<P: PortalLogin, C: CalendarLogin> SyncOrchestrator<P, C> {
    pub fn new(portal: P, calendar: C) -> Self {
        SyncOrchestrator { portal, calendar }
    }

    pub async fn run(
        &self,
        plan: &SyncPlan,
        on_progress: &mut dyn FnMut(Progress<'_>),
    ) -> SyncResult<SyncOutcome> {
        // Portal first: bad credentials must abort before any calendar call.
        let source = self.portal.login().await?;
        on_progress(Progress::PortalAuthenticated);

        let target = self.calendar.login().await?;
        on_progress(Progress::CalendarAuthenticated);

        let calendar_id = target.resolve(&plan.calendar_name).await?;
        debug!(calendar = %plan.calendar_name, %calendar_id, "resolved target calendar");
        on_progress(Progress::CalendarResolved {
            calendar_id: &calendar_id,
        });

        let cleared = target
            .clear_window(&calendar_id, plan.window.clear_from)
            .await?;
        info!(
            removed = cleared.succeeded(),
            failed = cleared.failed(),
            from = %plan.window.clear_from,
            "cleared mirror window"
        );
        on_progress(Progress::WindowCleared { report: &cleared });

        if plan.mode == SyncMode::ClearOnly {
            return Ok(SyncOutcome {
                calendar_id,
                cleared,
                inserted: None,
            });
        }

        let events = source
            .get_events(plan.window.fetch_start, plan.window.end)
            .await?;
        info!(count = events.len(), "fetched portal events");
        on_progress(Progress::EventsFetched { events: &events });

        let inserted = target.insert_events(&calendar_id, &events).await?;
        info!(
            inserted = inserted.succeeded(),
            failed = inserted.failed(),
            "inserted mirror events"
        );
        on_progress(Progress::EventsInserted { report: &inserted });

        Ok(SyncOutcome {
            calendar_id,
            cleared,
            inserted: Some(inserted),
        })
    }
}

/// Distinct trimmed course names, sorted.
pub fn course_names(events: &[SourceEvent]) -> BTreeSet<&str> {
    events.iter().map(|e| e.course_code.trim()).collect()
}
