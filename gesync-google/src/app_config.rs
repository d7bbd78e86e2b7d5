//! Where gesync keeps its files, and the user-provided Google OAuth client.
//!
//!   <config dir>/gesync/config.toml             portal + sync settings
//!   <config dir>/gesync/google/app_config.toml  OAuth client id/secret
//!   <config dir>/gesync/google/session.toml     OAuth tokens
//!
//! `GESYNC_CONFIG_DIR` replaces `<config dir>/gesync` when set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gesync_core::{SyncError, SyncResult};

pub const CONFIG_DIR_ENV: &str = "GESYNC_CONFIG_DIR";

/// Google OAuth client credentials (user-provided).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Root of all gesync files.
pub fn config_root() -> SyncResult<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    Ok(dirs::config_dir()
        .ok_or_else(|| SyncError::Config("Could not determine config directory".to_string()))?
        .join("gesync"))
}

/// Directory holding the Google credentials and session.
pub fn base_dir() -> SyncResult<PathBuf> {
    Ok(config_root()?.join("google"))
}

impl AppCredentials {
    pub fn load(dir: &Path) -> SyncResult<Self> {
        let path = dir.join("app_config.toml");

        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Google credentials not found.\n\n\
                Create {} with:\n\n\
                client_id = \"your-client-id.apps.googleusercontent.com\"\n\
                client_secret = \"your-client-secret\"\n\n\
                See https://console.cloud.google.com/apis/credentials for setup.",
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            SyncError::Config(format!(
                "Failed to read credentials from {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&contents).map_err(|e| {
            SyncError::Config(format!(
                "Failed to parse credentials from {}: {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_credentials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app_config.toml"),
            "client_id = \"abc.apps.googleusercontent.com\"\nclient_secret = \"s3cret\"\n",
        )
        .unwrap();

        let creds = AppCredentials::load(dir.path()).unwrap();
        assert_eq!(creds.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "s3cret");
    }

    #[test]
    fn test_missing_credentials_explains_setup() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppCredentials::load(dir.path()).unwrap_err();

        match err {
            SyncError::Config(msg) => assert!(msg.contains("client_secret")),
            other => panic!("expected config error, got {other:?}"),
        }
    }
}
