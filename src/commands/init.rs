use anyhow::{Context, Result};
use chrono::Local;
use dialoguer::{Input, MultiSelect};
use gesync_core::sync::{EventSource, PortalLogin, course_names};
use gesync_core::{SyncError, compute_sync_period};
use gesync_portal::{DEFAULT_BASE_URL, PortalAccount};
use owo_colors::OwoColorize;

use crate::config::{self, Config, Courses, Credentials};

pub async fn run() -> Result<Config> {
    let today = Local::now().date_naive();

    let calendar: String = Input::new()
        .with_prompt("Google calendar name")
        .interact_text()?;

    let (period, end) = loop {
        let period: String = Input::new()
            .with_prompt("Sync period (e.g. 30d, 2m, 1y)")
            .default("30d".to_string())
            .interact_text()?;

        match compute_sync_period(&period, today) {
            Ok(end) => break (period.trim().to_string(), end),
            Err(e) => println!("{}", e.to_string().red()),
        }
    };

    let (credentials, source) = loop {
        let username: String = Input::new()
            .with_prompt("Guichet Etudiant username")
            .interact_text()?;
        let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

        let account = PortalAccount {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: username.clone(),
            password: password.clone(),
            courses: Vec::new(),
        };

        match account.login().await {
            Ok(source) => break (Credentials { username, password }, source),
            Err(SyncError::Authentication(msg)) => println!("{}", msg.red()),
            Err(e) => return Err(e.into()),
        }
    };

    println!("Fetching your courses...");
    let events = source.get_events(today, end).await?;
    let courses: Vec<String> = course_names(&events)
        .into_iter()
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let selected = if courses.is_empty() {
        println!("No courses found in this period, all courses will be synced.");
        Vec::new()
    } else {
        let defaults = vec![true; courses.len()];
        let picks = MultiSelect::new()
            .with_prompt("Select courses to sync (space to toggle, enter to confirm)")
            .items(&courses)
            .defaults(&defaults)
            .interact()?;

        if picks.is_empty() {
            println!("No course selected, all courses will be synced.");
        }
        picks.into_iter().map(|i| courses[i].clone()).collect()
    };

    let config = Config {
        calendar,
        period,
        credentials,
        courses: Courses { selected },
        portal: None,
    };
    config.save()?;

    println!(
        "\nSaved configuration to {}",
        config::config_path()?.display()
    );
    println!("Run `gesync auth` to connect your Google account if you haven't yet.");

    Ok(config)
}
