use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Tunables for the polling manager.
///
/// Intervals are stored as milliseconds so the TOML stays plain integers;
/// `history_min_gap_ms = 0` disables append gating.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Refresh period per watched city.
    pub poll_interval_ms: u64,
    /// Retained samples per city; oldest evicted first.
    pub history_capacity: usize,
    /// Minimum spacing between stored history samples, decoupled from the
    /// poll interval.
    pub history_min_gap_ms: u64,
    /// Deadline for any single provider call.
    pub request_timeout_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 60_000,
            history_capacity: 100,
            history_min_gap_ms: 60_000,
            request_timeout_ms: 10_000,
        }
    }
}

impl ManagerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn history_min_gap(&self) -> Duration {
        Duration::from_millis(self.history_min_gap_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OpenWeather API key.
    pub api_key: Option<String>,

    /// Example TOML:
    /// [manager]
    /// poll_interval_ms = 60000
    #[serde(default)]
    pub manager: ManagerConfig,
}

impl Config {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
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
        let dirs = ProjectDirs::from("dev", "skywatch", "skywatch")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_defaults_match_documented_values() {
        let cfg = ManagerConfig::default();

        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.history_capacity, 100);
        assert_eq!(cfg.history_min_gap(), Duration::from_secs(60));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            api_key = "KEY"

            [manager]
            poll_interval_ms = 6000
            "#,
        )
        .expect("must parse");

        assert_eq!(cfg.api_key(), Some("KEY"));
        assert_eq!(cfg.manager.poll_interval(), Duration::from_secs(6));
        assert_eq!(cfg.manager.history_capacity, 100);
    }

    #[test]
    fn empty_toml_is_a_valid_config() {
        let cfg: Config = toml::from_str("").expect("must parse");
        assert!(cfg.api_key().is_none());
        assert_eq!(cfg.manager.poll_interval_ms, 60_000);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());
        cfg.manager.history_min_gap_ms = 0;

        let text = toml::to_string_pretty(&cfg).expect("must serialize");
        let back: Config = toml::from_str(&text).expect("must parse");

        assert_eq!(back.api_key(), Some("KEY"));
        assert!(back.manager.history_min_gap().is_zero());
    }
}
