//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/fluenthour/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/fluenthour/` (~/.config/fluenthour/)
//! - Data: `$XDG_DATA_HOME/fluenthour/` (~/.local/share/fluenthour/)
//! - State/Logs: `$XDG_STATE_HOME/fluenthour/` (~/.local/state/fluenthour/)

use crate::error::{Error, Result};
use crate::types::{Level, PhaseBoundary, SelectionMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Where session libraries come from
    #[serde(default)]
    pub library: LibraryConfig,

    /// How the next session is chosen
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Session runner behaviour
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Practice-hours goal
    #[serde(default)]
    pub goal: GoalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Library source configuration
#[derive(Debug, Deserialize)]
pub struct LibraryConfig {
    /// Glob patterns for library text files (`~/` is expanded)
    #[serde(default)]
    pub sources: Vec<String>,

    /// Include the starter library bundled with the binary
    #[serde(default = "default_include_starter")]
    pub include_starter: bool,

    /// Level assigned to sessions whose `Level:` field is missing or unreadable
    #[serde(default)]
    pub default_level: Level,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            sources: vec![],
            include_starter: default_include_starter(),
            default_level: Level::default(),
        }
    }
}

fn default_include_starter() -> bool {
    true
}

/// Selection strategy configuration
#[derive(Debug, Deserialize)]
pub struct SelectionConfig {
    /// Default selection mode
    #[serde(default)]
    pub mode: SelectionMode,

    /// Number of most recent sessions per level excluded from random picks
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Maximum length of the per-level recency list
    #[serde(default = "default_recent_cap")]
    pub recent_cap: usize,

    /// Optional category bias for random picks
    #[serde(default)]
    pub category: Option<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            mode: SelectionMode::default(),
            recent_window: default_recent_window(),
            recent_cap: default_recent_cap(),
            category: None,
        }
    }
}

fn default_recent_window() -> usize {
    6
}

fn default_recent_cap() -> usize {
    24
}

/// Session runner configuration
#[derive(Debug, Deserialize)]
pub struct RunnerConfig {
    /// What happens when a phase countdown reaches zero
    #[serde(default)]
    pub phase_boundary: PhaseBoundary,

    /// Minutes added by the short "add time" key
    #[serde(default = "default_short_extend")]
    pub short_extend_minutes: u32,

    /// Minutes added by the long "add time" key
    #[serde(default = "default_long_extend")]
    pub long_extend_minutes: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            phase_boundary: PhaseBoundary::default(),
            short_extend_minutes: default_short_extend(),
            long_extend_minutes: default_long_extend(),
        }
    }
}

fn default_short_extend() -> u32 {
    2
}

fn default_long_extend() -> u32 {
    5
}

/// Practice goal configuration
#[derive(Debug, Deserialize)]
pub struct GoalConfig {
    /// Target total practice hours
    #[serde(default = "default_goal_hours")]
    pub hours: u32,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            hours: default_goal_hours(),
        }
    }
}

fn default_goal_hours() -> u32 {
    100
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of rotated log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.selection.recent_cap < self.selection.recent_window {
            return Err(Error::Config(
                "selection.recent_cap must be at least selection.recent_window".to_string(),
            ));
        }
        if self.runner.short_extend_minutes == 0 || self.runner.long_extend_minutes == 0 {
            return Err(Error::Config(
                "runner extend minutes must be positive".to_string(),
            ));
        }
        if self.goal.hours == 0 {
            return Err(Error::Config("goal.hours must be positive".to_string()));
        }
        Ok(())
    }

    /// Library source patterns with a leading `~/` expanded to the home directory.
    pub fn library_patterns(&self) -> Vec<String> {
        self.library
            .sources
            .iter()
            .map(|pattern| match pattern.strip_prefix("~/") {
                Some(rest) => home_dir().join(rest).to_string_lossy().into_owned(),
                None => pattern.clone(),
            })
            .collect()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/fluenthour/config.toml` (~/.config/fluenthour/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("fluenthour").join("config.toml")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/fluenthour/` (~/.local/share/fluenthour/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("fluenthour")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/fluenthour/` (~/.local/state/fluenthour/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("fluenthour")
    }

    /// Returns the progress database path
    ///
    /// `$XDG_DATA_HOME/fluenthour/progress.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("progress.db")
    }
}
