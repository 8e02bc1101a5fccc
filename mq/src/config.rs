//! multiquery configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::mode::{ModeConfigError, QueryModeConfig};
use crate::runner::{TimeRange, TimeUnit};

const LOCAL_CONFIG: &str = ".multiquery.yml";

/// Main multiquery configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Query dispatch mode
    pub query: QueryModeConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Query runner configuration
    pub runner: RunnerConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        self.query.validate().context("Invalid query configuration")?;
        if self.runner.shell.trim().is_empty() {
            return Err(eyre::eyre!("runner.shell must not be empty"));
        }
        Ok(())
    }

    /// Replace the query mode configuration after validating it
    ///
    /// The caller persists the change with [`Config::save`].
    pub fn set_query_mode(&mut self, query: QueryModeConfig) -> Result<(), ModeConfigError> {
        query.validate()?;
        tracing::info!(mode = %query.mode, parallelism_limit = query.parallelism_limit, timeout_ms = query.timeout_ms, "Query mode updated");
        self.query = query;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            if !path.exists() {
                tracing::info!("Config file {} does not exist yet, using defaults", path.display());
                return Ok(Self::default());
            }
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .multiquery.yml
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/multiquery/multiquery.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Path that `save` should write to for the given `--config` value
    ///
    /// Explicit path, then an existing local config, then the user config.
    pub fn save_path(config_path: Option<&PathBuf>) -> PathBuf {
        if let Some(path) = config_path {
            return path.clone();
        }
        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return local_config;
        }
        Self::user_config_path().unwrap_or(local_config)
    }

    /// Save config to file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("multiquery").join("multiquery.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding the environment registry
    #[serde(rename = "environments-file")]
    pub environments_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/multiquery on Linux)
        let environments_file = dirs::data_dir()
            .map(|d| d.join("multiquery"))
            .unwrap_or_else(|| PathBuf::from(".multiquery"))
            .join("environments.json")
            .to_string_lossy()
            .into_owned();

        Self { environments_file }
    }
}

impl StorageConfig {
    /// Environments file with `~/` expanded
    pub fn environments_path(&self) -> PathBuf {
        expand_home(&self.environments_file)
    }
}

/// Query runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell used to run the query command
    pub shell: String,

    /// Command run once per environment; unset means queries cannot run
    pub command: Option<String>,

    /// Time range applied when `mq query` gets no `--time-range`
    #[serde(rename = "default-time-range")]
    pub default_time_range: Option<TimeRange>,

    /// Query used by `mq probe`
    #[serde(rename = "probe-query")]
    pub probe_query: String,

    /// Time range used by `mq probe`
    #[serde(rename = "probe-time-range")]
    pub probe_time_range: TimeRange,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            command: None,
            default_time_range: Some(TimeRange::new(60, TimeUnit::Minutes)),
            probe_query: "* | head 1".to_string(),
            probe_time_range: TimeRange::new(1, TimeUnit::Hours),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
