//! Agent configuration for snapkeep
//!
//! The configuration is a YAML document. Every section carries defaults so a
//! document naming only `sources` is enough to run a local backup.
//!
//! ```yaml
//! sources: [/etc, /home/app/data]
//! excludes: ["*.tmp"]
//! schedule: "0 3 * * *"
//! retention:
//!   keep_daily: 7
//!   keep_weekly: 4
//!   keep_monthly: 6
//! remote:
//!   enabled: true
//!   bucket: my-backups
//!   account_id: "..."
//!   application_key: "..."
//! notifications:
//!   discord:
//!     enabled: true
//!     webhook_url: https://discord.com/api/webhooks/...
//!     on_success: false
//!     on_failure: true
//! logging:
//!   level: info
//!   file: /var/log/snapkeep.log
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::paths::AgentPaths;
use crate::error::{AgentError, AgentResult};
use crate::schedule::CronSchedule;

/// Tiered retention windows
///
/// All three values are look-back windows, not item counts: `keep_daily`
/// is in days, `keep_weekly` in weeks of 7 days and `keep_monthly` in
/// months of a fixed 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Days during which every artifact is kept
    pub keep_daily: u32,
    /// Weeks during which the latest artifact of each ISO week is kept
    pub keep_weekly: u32,
    /// 30-day months during which the latest artifact of each month is kept
    pub keep_monthly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_daily: 7,
            keep_weekly: 4,
            keep_monthly: 6,
        }
    }
}

/// Remote object store settings
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_key: Option<String>,
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("enabled", &self.enabled)
            .field("bucket", &self.bucket)
            .field("account_id", &self.account_id.as_ref().map(|_| "***"))
            .field("application_key", &self.application_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Discord webhook settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordSettings {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
    /// Notify after a successful run
    pub on_success: bool,
    /// Notify after a failed run
    pub on_failure: bool,
}

impl Default for DiscordSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            on_success: false,
            on_failure: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub discord: DiscordSettings,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// One of trace, debug, info, warn, error
    pub level: String,
    /// Append log lines to this file in addition to stdout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Full agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths compressed into each artifact
    pub sources: Vec<PathBuf>,

    /// Glob patterns handed to the compression tool as exclusions
    pub excludes: Vec<String>,

    /// Five-field cron expression for the daemon
    pub schedule: String,

    /// Artifact directory (defaults to `<data dir>/backups`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    pub retention: RetentionPolicy,
    pub remote: RemoteSettings,
    pub notifications: NotificationSettings,
    pub logging: LogSettings,
}

pub(crate) fn default_schedule() -> String {
    "0 3 * * *".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            excludes: Vec::new(),
            schedule: default_schedule(),
            backup_dir: None,
            retention: RetentionPolicy::default(),
            remote: RemoteSettings::default(),
            notifications: NotificationSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Parse a configuration document
    pub fn from_yaml(contents: &str) -> AgentResult<Self> {
        // An empty document deserializes as unit, not as an empty mapping
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
            .map_err(|e| AgentError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load the configuration from a file
    pub fn load(path: &Path) -> AgentResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Io(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&contents)
    }

    /// Load the configuration, or fall back to defaults if the file doesn't exist
    pub fn load_or_default(paths: &AgentPaths) -> AgentResult<Self> {
        if paths.config_file().exists() {
            Self::load(paths.config_file())
        } else {
            Ok(Self::default())
        }
    }

    /// Save the configuration to disk
    pub fn save(&self, path: &Path) -> AgentResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AgentError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }

        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)
            .map_err(|e| AgentError::Io(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Artifact directory, resolved against the data dir when unset
    pub fn backup_dir(&self, paths: &AgentPaths) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| paths.default_backup_dir())
    }

    /// Check the document for settings that will degrade a feature
    ///
    /// None of these stop the agent; they are reported so the operator
    /// sees them in the log at startup and on every reload.
    pub fn validate(&self) -> Vec<AgentError> {
        let mut problems = Vec::new();

        if self.sources.is_empty() {
            problems.push(AgentError::Config(
                "no sources configured, every run will fail".into(),
            ));
        }

        if let Err(e) = CronSchedule::parse(&self.schedule) {
            problems.push(e);
        }

        if self.remote.enabled {
            if is_blank(&self.remote.bucket) {
                problems.push(AgentError::MissingBucket);
            }
            if is_blank(&self.remote.account_id) || is_blank(&self.remote.application_key) {
                problems.push(AgentError::MissingCredentials);
            }
        }

        let discord = &self.notifications.discord;
        if discord.enabled && is_blank(&discord.webhook_url) {
            problems.push(AgentError::Config(
                "discord notifications enabled without a webhook_url".into(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            problems.push(AgentError::Config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }

        problems
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retention.keep_daily, 7);
        assert_eq!(config.retention.keep_weekly, 4);
        assert_eq!(config.retention.keep_monthly, 6);
        assert!(!config.remote.enabled);
        assert!(!config.notifications.discord.on_success);
        assert!(config.notifications.discord.on_failure);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.schedule, "0 3 * * *");
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config = Config::from_yaml(
            "sources: [/etc]\nretention:\n  keep_daily: 3\nnotifications:\n  discord:\n    enabled: true\n",
        )
        .unwrap();

        assert_eq!(config.sources, vec![PathBuf::from("/etc")]);
        assert_eq!(config.retention.keep_daily, 3);
        assert_eq!(config.retention.keep_weekly, 4);
        assert!(config.notifications.discord.enabled);
        assert!(config.notifications.discord.on_failure);
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_document() {
        let err = Config::from_yaml("sources: 12: 3").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = AgentPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut config = Config::default();
        config.sources = vec![PathBuf::from("/srv/data")];
        config.remote.enabled = true;
        config.remote.bucket = Some("bucket".into());
        config.save(paths.config_file()).unwrap();

        let loaded = Config::load_or_default(&paths).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_reports_degraded_features() {
        let mut config = Config::default();
        config.remote.enabled = true;
        config.notifications.discord.enabled = true;
        config.logging.level = "loud".into();
        config.schedule = "not cron".into();

        let problems = config.validate();
        assert!(problems.iter().any(|p| matches!(p, AgentError::MissingBucket)));
        assert!(problems
            .iter()
            .any(|p| matches!(p, AgentError::MissingCredentials)));
        assert!(problems.iter().any(|p| matches!(p, AgentError::Schedule(_))));
        assert_eq!(problems.len(), 6);
    }

    #[test]
    fn test_validate_clean_config() {
        let mut config = Config::default();
        config.sources = vec![PathBuf::from("/etc")];
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_remote_debug_masks_secrets() {
        let remote = RemoteSettings {
            enabled: true,
            bucket: Some("b".into()),
            account_id: Some("acct-123".into()),
            application_key: Some("secret-key".into()),
        };
        let debug = format!("{:?}", remote);
        assert!(!debug.contains("secret-key"));
        assert!(!debug.contains("acct-123"));
    }
}
