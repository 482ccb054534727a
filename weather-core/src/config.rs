use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::status::OverlapPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DATABASE_FILE: &str = "weather.db";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// timeout_secs = 10
/// overlap_policy = "latest-wins"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// OpenWeather API key.
    pub api_key: Option<String>,

    /// Provider base URL, without the `/weather` or `/forecast` suffix.
    pub base_url: Option<String>,

    /// Per-request timeout applied by the shared HTTP client.
    pub timeout_secs: Option<u64>,

    /// Where the favorites database lives; defaults to the platform data dir.
    pub database_path: Option<PathBuf>,

    /// How overlapping fetches of the same kind are reconciled.
    pub overlap_policy: Option<OverlapPolicy>,
}

impl Config {
    /// Returns the API key or an error telling the user how to set one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured.\n\
                     Hint: run `weather configure` and enter your OpenWeather API key."
                )
            })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn overlap_policy(&self) -> OverlapPolicy {
        self.overlap_policy.unwrap_or_default()
    }

    /// Configured database path, or `weather.db` in the platform data dir.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.require_api_key().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `weather configure`"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());
        assert!(cfg.require_api_key().is_err());

        cfg.set_api_key("KEY".into());
        assert_eq!(cfg.require_api_key().unwrap(), "KEY");
    }

    #[test]
    fn defaults_apply_when_keys_absent() {
        let cfg = Config::default();
        assert_eq!(cfg.base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(cfg.overlap_policy(), OverlapPolicy::LatestWins);
    }

    #[test]
    fn parses_full_toml() {
        let cfg = Config::from_toml(
            r#"
            api_key = "abc"
            base_url = "http://localhost:9000"
            timeout_secs = 3
            database_path = "/tmp/fav.db"
            overlap_policy = "last-completion-wins"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.require_api_key().unwrap(), "abc");
        assert_eq!(cfg.base_url(), "http://localhost:9000");
        assert_eq!(cfg.timeout(), Duration::from_secs(3));
        assert_eq!(cfg.database_path().unwrap(), PathBuf::from("/tmp/fav.db"));
        assert_eq!(cfg.overlap_policy(), OverlapPolicy::LastCompletionWins);
    }

    #[test]
    fn rejects_unknown_policy() {
        let err = Config::from_toml(r#"overlap_policy = "first-wins""#).unwrap_err();
        assert!(err.to_string().contains("Invalid configuration TOML"));
    }

    #[test]
    fn serializes_back_to_toml() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.overlap_policy = Some(OverlapPolicy::LatestWins);

        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed, cfg);
    }
}
