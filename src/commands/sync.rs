use anyhow::Result;
use chrono::NaiveDate;
use gesync_core::SyncWindow;
use gesync_core::sync::{Progress, SyncMode, SyncOrchestrator, SyncPlan, course_names};
use gesync_google::GoogleAccount;
use owo_colors::OwoColorize;

use super::report_lines;
use crate::config::Config;

pub struct SyncArgs {
    pub calendar: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub clear: bool,
}

/// Clear-only runs fetch nothing, so their window ignores the period and
/// any explicit dates.
fn build_plan(config: &Config, args: SyncArgs) -> Result<SyncPlan> {
    let (window, mode) = if args.clear {
        (SyncWindow::clear_only_from_now(), SyncMode::ClearOnly)
    } else {
        let window = SyncWindow::from_args(args.start_date, args.end_date, &config.period)?;
        (window, SyncMode::Full)
    };

    Ok(SyncPlan {
        calendar_name: args.calendar.unwrap_or_else(|| config.calendar.clone()),
        window,
        mode,
    })
}

pub async fn run(config: &Config, args: SyncArgs) -> Result<()> {
    let plan = build_plan(config, args)?;

    match plan.mode {
        SyncMode::Full => println!(
            "Syncing {} to {} into '{}'",
            plan.window.fetch_start, plan.window.end, plan.calendar_name
        ),
        SyncMode::ClearOnly => println!(
            "Clearing synced events from {} in '{}'",
            plan.window.clear_from.date_naive(),
            plan.calendar_name
        ),
    }

    let orchestrator =
        SyncOrchestrator::new(config.portal_account(), GoogleAccount::from_config_dir()?);
    orchestrator.run(&plan, &mut print_progress).await?;

    println!("{}", "Done.".green());
    Ok(())
}

fn print_progress(progress: Progress<'_>) {
    for line in progress_lines(&progress) {
        println!("{}", line);
    }
}

fn progress_lines(progress: &Progress<'_>) -> Vec<String> {
    match progress {
        Progress::PortalAuthenticated => vec!["Logged in to Guichet Etudiant".to_string()],
        Progress::CalendarAuthenticated => vec!["Logged in to Google Calendar".to_string()],
        Progress::CalendarResolved { calendar_id } => {
            vec![format!("Using calendar {}", calendar_id.dimmed())]
        }
        Progress::WindowCleared { report } => report_lines("Removed", report),
        Progress::EventsFetched { events } => {
            let mut lines = vec![format!("Fetched {} events for courses:", events.len())];
            lines.extend(course_names(events).into_iter().map(|c| format!("  {}", c)));
            lines
        }
        Progress::EventsInserted { report } => report_lines("Inserted", report),
    }
}
