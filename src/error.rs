//! Custom error types for snapkeep
//!
//! This module defines the error hierarchy for the agent using thiserror
//! for ergonomic error definitions. Only [`AgentError::Source`] and
//! [`AgentError::ToolFailure`] abort a backup run; everything else degrades
//! a single feature and is surfaced through the log.

use thiserror::Error;

/// The main error type for snapkeep operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing or invalid settings
    #[error("Configuration error: {0}")]
    Config(String),

    /// No source paths configured for the archive
    #[error("No sources configured: refusing to produce an empty archive")]
    Source,

    /// An external tool (compression or sync) reported a fatal signal
    #[error("{tool} failed: {detail}")]
    ToolFailure { tool: &'static str, detail: String },

    /// A stale artifact could not be deleted
    #[error("Failed to delete {path}: {reason}")]
    Cleanup { path: String, reason: String },

    /// Notification delivery failed
    #[error("Notification error: {0}")]
    Notify(String),

    /// A filename does not follow the artifact naming scheme
    #[error("Malformed artifact name: {0}")]
    MalformedName(String),

    /// Remote sync enabled without credentials
    #[error("Remote sync is enabled but credentials are missing")]
    MissingCredentials,

    /// Remote sync enabled without a bucket
    #[error("Remote sync is enabled but no bucket is configured")]
    MissingBucket,

    /// Invalid cron expression
    #[error("Schedule error: {0}")]
    Schedule(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// YAML configuration parse errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

impl AgentError {
    /// Create a tool failure for the compression tool
    pub fn archive_failed(detail: impl Into<String>) -> Self {
        Self::ToolFailure {
            tool: "archive",
            detail: detail.into(),
        }
    }

    /// Create a tool failure for the sync tool
    pub fn sync_failed(detail: impl Into<String>) -> Self {
        Self::ToolFailure {
            tool: "sync",
            detail: detail.into(),
        }
    }

    /// Whether this error terminates a backup run
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Source | Self::ToolFailure { .. })
    }

    /// Check if this is a configuration problem
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::MissingCredentials | Self::MissingBucket
        )
    }
}

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for AgentError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for snapkeep operations
pub type AgentResult<T> = Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::Config("bad level".into());
        assert_eq!(err.to_string(), "Configuration error: bad level");

        let err = AgentError::archive_failed("tar exited with status 2");
        assert_eq!(err.to_string(), "archive failed: tar exited with status 2");
    }

    #[test]
    fn test_run_fatal_classification() {
        assert!(AgentError::Source.is_run_fatal());
        assert!(AgentError::sync_failed("exit 1").is_run_fatal());
        assert!(!AgentError::Notify("timeout".into()).is_run_fatal());
        assert!(!AgentError::MissingBucket.is_run_fatal());
        assert!(!AgentError::Cleanup {
            path: "/tmp/x".into(),
            reason: "denied".into()
        }
        .is_run_fatal());
    }

    #[test]
    fn test_config_classification() {
        assert!(AgentError::MissingCredentials.is_config());
        assert!(AgentError::Config("x".into()).is_config());
        assert!(!AgentError::Source.is_config());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AgentError = io_err.into();
        assert!(matches!(err, AgentError::Io(_)));
    }
}
