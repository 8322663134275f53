//! Config file location and first-run creation

use std::path::{Path, PathBuf};

use super::Config;
use crate::Result;

/// Return the default config file path: `<config_dir>/csync/config.yaml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("csync").join("config.yaml"))
}

/// Load the config file at `path`, writing the defaults there first if it
/// does not exist yet
///
/// # Errors
///
/// Returns error if the file cannot be created, read, parsed or validated
pub fn load_or_create(path: &Path) -> Result<Config> {
    if path.exists() {
        return Config::load(path);
    }

    let config = Config::default();
    config.save(path)?;
    tracing::info!(path = %path.display(), "created default config file");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_ends_in_csync_dir() {
        if let Some(path) = config_file_path() {
            assert!(path.ends_with("csync/config.yaml"));
        }
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("csync").join("config.yaml");

        let config = load_or_create(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.is_file());

        let written: Config =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
        assert_eq!(written.reminder.time, "17:00");
    }

    #[test]
    fn existing_file_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "reminder:\n  title: Standup notes\n").unwrap();

        let config = load_or_create(&path).unwrap();
        assert_eq!(config.reminder.title, "Standup notes");
        assert_eq!(config.reminder.time, "17:00");
    }
}
