//! User configuration at `<config dir>/gesync/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use gesync_portal::{DEFAULT_BASE_URL, PortalAccount};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Display name of the target Google calendar
    pub calendar: String,

    /// Relative sync period, e.g. "30d", "2m", "1y"
    pub period: String,

    pub credentials: Credentials,

    #[serde(default)]
    pub courses: Courses,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal: Option<PortalConfig>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Course allow-list. Empty means every course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Courses {
    #[serde(default)]
    pub selected: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub base_url: String,
}

pub fn config_path() -> Result<PathBuf> {
    Ok(gesync_google::config_root()?.join("config.toml"))
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Config file not found at {}\n\n\
                Create it with:\n  \
                gesync init",
                path.display()
            );
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        // Owner-only (0600), the file holds the portal password:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    pub fn portal_base_url(&self) -> &str {
        self.portal
            .as_ref()
            .map(|p| p.base_url.as_str())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn portal_account(&self) -> PortalAccount {
        PortalAccount {
            base_url: self.portal_base_url().to_string(),
            username: self.credentials.username.clone(),
            password: self.credentials.password.clone(),
            courses: self.courses.selected.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            calendar: "University".to_string(),
            period: "30d".to_string(),
            credentials: Credentials {
                username: "jdoe".to_string(),
                password: "secret".to_string(),
            },
            courses: Courses {
                selected: vec!["MATH101".to_string(), "PHYS201".to_string()],
            },
            portal: None,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        sample().save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded, sample());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_minimal_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "calendar = \"Uni\"\nperiod = \"2m\"\n\n[credentials]\nusername = \"a\"\npassword = \"b\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert!(config.courses.selected.is_empty());
        assert_eq!(config.portal_base_url(), DEFAULT_BASE_URL);
        assert!(config.portal_account().courses.is_empty());
    }

    #[test]
    fn test_portal_override() {
        let mut config = sample();
        config.portal = Some(PortalConfig {
            base_url: "http://localhost:9000".to_string(),
        });
        assert_eq!(config.portal_account().base_url, "http://localhost:9000");
    }

    #[test]
    fn test_missing_file_points_to_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(err.to_string().contains("gesync init"));
    }

    #[test]
    fn test_debug_hides_password() {
        let shown = format!("{:?}", sample());
        assert!(!shown.contains("secret"));
    }
}
