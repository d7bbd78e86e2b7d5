use anyhow::Result;

pub async fn run() -> Result<()> {
    let dir = gesync_google::app_config::base_dir()?;

    println!("Authenticating with Google...");

    gesync_google::auth::authenticate(&dir).await?;

    println!("\nRun `gesync` to sync your schedule.");

    Ok(())
}
