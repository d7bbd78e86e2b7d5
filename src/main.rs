mod commands;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gesync_core::SyncError;
use owo_colors::OwoColorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::commands::sync::SyncArgs;
use crate::config::Config;

#[derive(Parser)]
#[command(name = "gesync")]
#[command(about = "Mirror your uni.lu Guichet Etudiant schedule into a Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Target calendar (display name), overrides the configured one
    #[arg(short, long)]
    calendar: Option<String>,

    /// First day to sync (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// First day not synced (YYYY-MM-DD, defaults to start + configured period)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Only remove previously synced events, don't insert new ones
    #[arg(long)]
    clear: bool,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive first-run configuration
    Init,
    /// Connect a Google account
    Auth,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e).red());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Init) => commands::init::run().await.map(|_| ()),
        Some(Commands::Auth) => commands::auth::run().await,
        None => {
            if !config::config_path()?.exists() {
                println!("No configuration found, let's create one.\n");
                commands::init::run().await?;
                println!("\nRun `gesync` again to sync your schedule.");
                return Ok(());
            }

            let config = Config::load()?;
            let args = SyncArgs {
                calendar: cli.calendar,
                start_date: cli.start_date,
                end_date: cli.end_date,
                clear: cli.clear,
            };
            commands::sync::run(&config, args).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "warn,gesync=debug,gesync_core=debug,gesync_portal=debug,gesync_google=debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Fatal errors name their class so bad credentials, a missing calendar
/// and network trouble read differently.
fn render_error(e: &anyhow::Error) -> String {
    match e.downcast_ref::<SyncError>() {
        Some(sync_error) => format!("Sync aborted ({}): {}", sync_error.class(), sync_error),
        None => format!("Error: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "gesync",
            "--calendar",
            "Uni",
            "--start-date",
            "2024-03-04",
            "--end-date",
            "2024-04-01",
            "--clear",
        ])
        .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.calendar.as_deref(), Some("Uni"));
        assert_eq!(cli.start_date, NaiveDate::from_ymd_opt(2024, 3, 4));
        assert_eq!(cli.end_date, NaiveDate::from_ymd_opt(2024, 4, 1));
        assert!(cli.clear);
    }

    #[test]
    fn test_cli_subcommands() {
        let cli = Cli::try_parse_from(["gesync", "auth"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Auth)));

        let cli = Cli::try_parse_from(["gesync", "init"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Init)));
    }

    #[test]
    fn test_cli_rejects_bad_date() {
        assert!(Cli::try_parse_from(["gesync", "--start-date", "04/03/2024"]).is_err());
    }

    #[test]
    fn test_error_names_class() {
        let e = anyhow::Error::new(SyncError::Authentication(
            "Wrong username/password supplied.".to_string(),
        ));
        assert_eq!(
            render_error(&e),
            "Sync aborted (bad credentials): Authentication failed: Wrong username/password supplied."
        );

        let e = anyhow::Error::new(SyncError::CalendarNotFound("Uni".to_string()));
        assert!(render_error(&e).contains("unresolved calendar"));

        let e = anyhow::anyhow!("disk full");
        assert_eq!(render_error(&e), "Error: disk full");
    }
}
