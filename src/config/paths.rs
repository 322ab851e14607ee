//! Path management for snapkeep
//!
//! Resolves where the configuration document and the default artifact
//! directory live.
//!
//! ## Path Resolution Order
//!
//! Config file:
//! 1. `--config` flag
//! 2. `SNAPKEEP_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/snapkeep/config.yaml` on Linux)
//!
//! Data directory:
//! 1. `SNAPKEEP_DATA_DIR` environment variable
//! 2. Platform data dir (`~/.local/share/snapkeep` on Linux)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{AgentError, AgentResult};

const CONFIG_ENV: &str = "SNAPKEEP_CONFIG";
const DATA_ENV: &str = "SNAPKEEP_DATA_DIR";

/// Manages all paths used by snapkeep
#[derive(Debug, Clone)]
pub struct AgentPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AgentPaths {
    /// Resolve paths, honoring an explicit config file override
    ///
    /// # Errors
    ///
    /// Returns an error if no platform directories can be determined and no
    /// override was given.
    pub fn new(config_override: Option<PathBuf>) -> AgentResult<Self> {
        let dirs = ProjectDirs::from("", "", "snapkeep");

        let config_file = match config_override.or_else(|| env_path(CONFIG_ENV)) {
            Some(path) => path,
            None => dirs
                .as_ref()
                .map(|d| d.config_dir().join("config.yaml"))
                .ok_or_else(|| {
                    AgentError::Config("Could not determine a config directory".into())
                })?,
        };

        let data_dir = match env_path(DATA_ENV) {
            Some(path) => path,
            None => dirs
                .as_ref()
                .map(|d| d.data_dir().to_path_buf())
                .ok_or_else(|| {
                    AgentError::Config("Could not determine a data directory".into())
                })?,
        };

        Ok(Self {
            config_file,
            data_dir,
        })
    }

    /// Create AgentPaths rooted at a single directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self {
            config_file: base_dir.join("config.yaml"),
            data_dir: base_dir.join("data"),
        }
    }

    /// Path to the YAML configuration document
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Default artifact directory when the config does not name one
    pub fn default_backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Check if a configuration document exists
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists()
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AgentPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.config_file(), temp_dir.path().join("config.yaml"));
        assert_eq!(paths.data_dir(), temp_dir.path().join("data"));
        assert_eq!(
            paths.default_backup_dir(),
            temp_dir.path().join("data").join("backups")
        );
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_explicit_config_override() {
        let temp_dir = TempDir::new().unwrap();
        let custom = temp_dir.path().join("agent.yaml");

        let paths = AgentPaths::new(Some(custom.clone())).unwrap();
        assert_eq!(paths.config_file(), custom);
    }
}
