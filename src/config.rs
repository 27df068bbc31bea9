//! On-disk configuration.
//!
//! A missing file means defaults. Every key is optional.

use crate::error::AppError;
use crate::services::github_client::DEFAULT_API_URL;
use crate::services::sync_engine::{DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_SYNC_INTERVAL_SECS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "PR_TRACKER_CONFIG";

/// Environment variable overriding the data directory.
pub const DATA_HOME_ENV: &str = "PR_TRACKER_DATA_HOME";

/// Environment variable supplying the GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file; defaults to `pr-tracker.db` in the data directory.
    pub database_path: Option<PathBuf>,
    pub github_api_url: String,
    pub sync_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Parallel per-PR fetches during a sync.
    pub max_concurrent_requests: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            github_api_url: DEFAULT_API_URL.to_string(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl AppConfig {
    /// Database location: explicit override, then config, then data dir.
    pub fn resolve_db_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.database_path.clone())
            .unwrap_or_else(|| crate::db::get_db_path(&app_data_dir()))
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.sync_interval_secs == 0 {
            return Err(AppError::config("sync_interval_secs must be greater than zero"));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::config("request_timeout_secs must be greater than zero"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(AppError::config("max_concurrent_requests must be greater than zero"));
        }
        Ok(())
    }
}

/// Load the config from `path`, or from [`config_path`] when `None`.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }
        Err(e) => {
            return Err(AppError::config(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let config: AppConfig = toml::from_str(&contents)
        .map_err(|e| AppError::config(format!("Invalid config {}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Default config file location.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    app_data_dir().join("config.toml")
}

/// Per-user data directory.
pub fn app_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(DATA_HOME_ENV) {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = home::home_dir() {
            return home
                .join("Library")
                .join("Application Support")
                .join("pr-tracker");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("pr-tracker");
        }
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("pr-tracker");
        }
        if let Some(home) = home::home_dir() {
            return home.join(".local").join("share").join("pr-tracker");
        }
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".pr-tracker")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.sync_interval_secs, DEFAULT_SYNC_INTERVAL_SECS);
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "sync_interval_secs = 60\ndatabase_path = \"/tmp/prs.db\"\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sync_interval_secs, 60);
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/prs.db")));
        assert_eq!(config.github_api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "sync_interval_secs = \"soon\"").unwrap();
        assert!(load_config(Some(&path)).is_err());

        std::fs::write(&path, "max_concurrent_requests = 0").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn test_every_key_is_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/data/prs.db"
github_api_url = "https://ghe.example.com/api/v3"
sync_interval_secs = 120
request_timeout_secs = 10
max_concurrent_requests = 8
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(
            config,
            AppConfig {
                database_path: Some(PathBuf::from("/data/prs.db")),
                github_api_url: "https://ghe.example.com/api/v3".to_string(),
                sync_interval_secs: 120,
                request_timeout_secs: 10,
                max_concurrent_requests: 8,
            }
        );
    }

    #[test]
    fn test_resolve_db_path_precedence() {
        let config = AppConfig {
            database_path: Some(PathBuf::from("/from/config.db")),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolve_db_path(Some(Path::new("/from/flag.db"))),
            PathBuf::from("/from/flag.db")
        );
        assert_eq!(config.resolve_db_path(None), PathBuf::from("/from/config.db"));
        assert!(AppConfig::default()
            .resolve_db_path(None)
            .ends_with("pr-tracker.db"));
    }
}
