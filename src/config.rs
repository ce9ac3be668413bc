//! Application preferences management.
//!
//! This module handles loading and saving the per-user preferences,
//! which record the last logged-in username. It also resolves the
//! preferences directory and the folder where local project checkouts
//! are kept.
//!
//! Preferences are stored at `~/.config/pavlovia/config.json`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for preference directory paths
const APP_NAME: &str = "pavlovia";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Folder under the prefs dir for local project checkouts
const PROJECTS_DIR: &str = "projects";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(skip)]
    path: PathBuf,
    /// Username recorded by the last successful login.
    pub last_user: Option<String>,
}

impl Config {
    /// Load the preferences from the fixed per-user location.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path()?)
    }

    /// Load the preferences backed by `path`; a missing file yields the
    /// defaults bound to that path.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let mut config: Config = serde_json::from_str(&contents)?;
            config.path = path;
            Ok(config)
        } else {
            Ok(Self {
                path,
                ..Self::default()
            })
        }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Per-user preferences directory for this application.
pub fn prefs_dir() -> Result<PathBuf> {
    let config_dir =
        dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
    Ok(config_dir.join(APP_NAME))
}

/// Folder where local project checkouts are kept.
pub fn projects_dir() -> Result<PathBuf> {
    Ok(prefs_dir()?.join(PROJECTS_DIR))
}

fn config_path() -> Result<PathBuf> {
    Ok(prefs_dir()?.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join(CONFIG_FILE)).unwrap();
        assert!(config.last_user.is_none());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::load_from(path.clone()).unwrap();
        config.last_user = Some("jsmith".to_string());
        config.save().unwrap();

        let reloaded = Config::load_from(path).unwrap();
        assert_eq!(reloaded.last_user.as_deref(), Some("jsmith"));
    }

    #[test]
    fn test_path_is_not_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let mut config = Config::load_from(path.clone()).unwrap();
        config.last_user = Some("jsmith".to_string());
        config.save().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("path"));
    }
}
