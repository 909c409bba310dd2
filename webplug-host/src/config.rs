//! Host configuration (`webplug.toml`)
//!
//! ```toml
//! plugins_dir = "plugins"
//! fuel_limit = 10000000   # optional
//! ```
//!
//! A relative `plugins_dir` is resolved against the directory holding the
//! config file.

use crate::loader::DEFAULT_FUEL_LIMIT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name looked up in the working and user config directories
pub const CONFIG_FILE_NAME: &str = "webplug.toml";

/// Application directory under the user config dir
pub const APP_NAME: &str = "webplug";

/// Errors loading the host config; all of them are fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No config file found (searched: {})", display_paths(.0))]
    NotFound(Vec<PathBuf>),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("'plugins_dir' must not be empty")]
    EmptyPluginsDir,

    #[error("'fuel_limit' must be greater than zero")]
    ZeroFuel,
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    /// Directory scanned for plugin artifacts
    pub plugins_dir: PathBuf,

    /// Fuel granted to each guest call
    #[serde(default = "default_fuel_limit")]
    pub fuel_limit: u64,
}

fn default_fuel_limit() -> u64 {
    DEFAULT_FUEL_LIMIT
}

impl HostConfig {
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            fuel_limit: DEFAULT_FUEL_LIMIT,
        }
    }

    /// Parse config text; `origin` is only used in error messages
    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(&text, path)?;
        if config.plugins_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.plugins_dir = parent.join(&config.plugins_dir);
            }
        }

        tracing::debug!(
            path = %path.display(),
            plugins_dir = %config.plugins_dir.display(),
            "Config loaded"
        );
        Ok(config)
    }

    /// Candidate locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_NAME).join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Load `explicit` if given, else the first existing search path
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates = Self::search_paths();
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path),
            None => Err(ConfigError::NotFound(candidates)),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.plugins_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPluginsDir);
        }
        if self.fuel_limit == 0 {
            return Err(ConfigError::ZeroFuel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_with_defaults() {
        let config = HostConfig::parse("plugins_dir = \"/srv/plugins\"\n", Path::new("t")).unwrap();
        assert_eq!(config.plugins_dir, PathBuf::from("/srv/plugins"));
        assert_eq!(config.fuel_limit, DEFAULT_FUEL_LIMIT);
    }

    #[test]
    fn test_missing_plugins_dir_is_error() {
        let err = HostConfig::parse("fuel_limit = 5\n", Path::new("t")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_values() {
        let err = HostConfig::parse("plugins_dir = \"\"\n", Path::new("t")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPluginsDir));

        let text = "plugins_dir = \"p\"\nfuel_limit = 0\n";
        let err = HostConfig::parse(text, Path::new("t")).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroFuel));
    }

    #[test]
    fn test_relative_plugins_dir_follows_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "plugins_dir = \"plugins\"\nfuel_limit = 42\n").unwrap();

        let config = HostConfig::discover(Some(&path)).unwrap();
        assert_eq!(config.plugins_dir, temp.path().join("plugins"));
        assert_eq!(config.fuel_limit, 42);
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = HostConfig::discover(Some(Path::new("/nonexistent/webplug.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
