//! Configuration management for csync
//!
//! Settings live in a YAML file, `<config_dir>/csync/config.yaml` by default.
//! Every section is optional; missing keys take their defaults.

pub mod file;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use file::{config_file_path, load_or_create};

use crate::plugins::{ConflictPolicy, LoadOptions};
use crate::{Error, Result};

/// Wall-clock time of day, 00:00 to 23:59
static TIME_OF_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid regex"));

/// Keys accepted by [`Config::set`]
pub const SETTABLE_KEYS: &[&str] = &[
    "reminder.time",
    "reminder.title",
    "reminder.message",
    "plugins.on_conflict",
    "plugins.load_timeout_secs",
];

/// csync configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Daily contribution reminder
    pub reminder: ReminderConfig,

    /// Plugin loading
    pub plugins: PluginsConfig,
}

/// Reminder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// Local time the reminder fires, as `HH:MM`
    pub time: String,

    /// Notification title
    pub title: String,

    /// Notification body
    pub message: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            time: "17:00".to_string(),
            title: "Contribution Reminder".to_string(),
            message: "Don't forget to log your contributions!".to_string(),
        }
    }
}

/// Plugin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Artifacts loaded at startup
    pub external: Vec<PathBuf>,

    /// Directories scanned for artifacts at startup
    pub search_dirs: Vec<PathBuf>,

    /// What to do when a plugin name is registered twice
    pub on_conflict: ConflictPolicy,

    /// Limit for the handshake with an artifact
    pub load_timeout_secs: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            external: Vec::new(),
            search_dirs: Vec::new(),
            on_conflict: ConflictPolicy::default(),
            load_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load and validate the configuration at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, serde_yaml::to_string(self)?)?;
        tracing::debug!(path = %path.display(), "saved config file");
        Ok(())
    }

    /// Check that every setting is usable
    ///
    /// # Errors
    ///
    /// Returns `Config` error describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !TIME_OF_DAY.is_match(&self.reminder.time) {
            return Err(Error::Config(format!(
                "reminder.time must be HH:MM, got '{}'",
                self.reminder.time
            )));
        }

        if self.reminder.title.trim().is_empty() {
            return Err(Error::Config("reminder.title must not be empty".to_string()));
        }

        if self.reminder.message.trim().is_empty() {
            return Err(Error::Config("reminder.message must not be empty".to_string()));
        }

        if self.plugins.load_timeout_secs == 0 {
            return Err(Error::Config(
                "plugins.load_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Update one setting by its dotted key
    ///
    /// The configuration is left unchanged if the new value is invalid.
    ///
    /// # Errors
    ///
    /// Returns `Config` error for unknown keys and invalid values
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut updated = self.clone();

        match key {
            "reminder.time" => updated.reminder.time = value.trim().to_string(),
            "reminder.title" => updated.reminder.title = value.to_string(),
            "reminder.message" => updated.reminder.message = value.to_string(),
            "plugins.on_conflict" => updated.plugins.on_conflict = value.parse()?,
            "plugins.load_timeout_secs" => {
                updated.plugins.load_timeout_secs = value.trim().parse().map_err(|_| {
                    Error::Config(format!(
                        "plugins.load_timeout_secs must be a whole number of seconds, got '{value}'"
                    ))
                })?;
            }
            _ => {
                return Err(Error::Config(format!(
                    "unknown config key '{key}' (expected one of: {})",
                    SETTABLE_KEYS.join(", ")
                )));
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Remember an artifact to load at startup
    ///
    /// Returns `false` if the path is already listed.
    #[must_use]
    pub fn add_external(&mut self, path: PathBuf) -> bool {
        if self.plugins.external.contains(&path) {
            return false;
        }

        self.plugins.external.push(path);
        true
    }

    /// Options for loading external artifacts
    #[must_use]
    pub const fn load_options(&self) -> LoadOptions {
        LoadOptions {
            timeout: Duration::from_secs(self.plugins.load_timeout_secs),
        }
    }
}
