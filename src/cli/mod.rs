//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the backup pipeline.

pub mod backup;
pub mod config;
pub mod daemon;

pub use backup::{handle_list, handle_prune, handle_run};
pub use config::{handle_init, handle_notify_test, handle_show};
pub use daemon::handle_daemon;
