use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Default country code appended to zip queries when none is given.
pub const DEFAULT_COUNTRY: &str = "US";

/// Default per-request timeout, midway through the 15-30s recommendation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// country_code = "US"
/// timeout_secs = 20
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// OpenWeatherMap API key, required for any lookup.
    pub api_key: Option<String>,

    /// Country code used when a zip query does not specify one.
    pub country_code: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,

    /// Override for the saved-locations database file.
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Return the configured API key, with a hint when it is missing.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `zipcast configure` and enter your OpenWeatherMap API key."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn country_code(&self) -> &str {
        self.country_code.as_deref().unwrap_or(DEFAULT_COUNTRY)
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
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
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Path to the saved-locations database file, honoring any override.
    pub fn database_file_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let dirs = project_dirs()?;
        Ok(dirs.data_dir().join("locations.db"))
    }

    /// Connection URL for the saved-locations database, creating the parent
    /// directory as needed so sqlite can create the file.
    pub fn database_url(&self) -> Result<String> {
        let path = self.database_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        Ok(format!("sqlite://{}", path.display()))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "zipcast", "zipcast")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
