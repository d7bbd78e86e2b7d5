pub mod auth;
pub mod init;
pub mod sync;

use gesync_core::{BatchReport, ItemOutcome};
use owo_colors::OwoColorize;

/// "Removed 12 events (1 failed)" plus one line per failed item.
pub fn report_lines(verb: &str, report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} events ({} failed)",
        verb,
        report.succeeded(),
        report.failed()
    )];

    for failure in report.failures() {
        if let ItemOutcome::Failed { message, .. } = failure {
            lines.push(format!("Error: {}", message).red().to_string());
        }
    }

    lines
}
