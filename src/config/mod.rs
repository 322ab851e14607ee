//! Configuration module for snapkeep
//!
//! This module provides configuration management including:
//! - Config file and data directory resolution
//! - The YAML configuration document
//! - Snapshot handoff and file-watch hot reload

pub mod paths;
pub mod settings;
pub mod snapshot;

pub use paths::AgentPaths;
pub use settings::{
    Config, DiscordSettings, LogSettings, NotificationSettings, RemoteSettings, RetentionPolicy,
};
pub use snapshot::{ConfigHandle, ConfigWatcher, WatcherGuard};
