//! snapkeep - Scheduled backup agent with tiered retention
//!
//! This library provides the core functionality for the snapkeep agent.
//! Each run compresses the configured source paths into a single
//! timestamped artifact, prunes old artifacts under a daily/weekly/monthly
//! retention policy, mirrors the artifact directory to a remote bucket and
//! reports the outcome to a webhook.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration, path resolution and hot reload
//! - `error`: Custom error types
//! - `backup`: Artifact naming, retention and the run pipeline
//! - `notify`: Run outcome notifications
//! - `schedule`: Cron expressions
//! - `daemon`: Scheduled execution
//! - `shutdown`: Termination signal handling
//! - `logging`: Log subscriber setup
//! - `display`: Terminal formatting
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use snapkeep::config::{AgentPaths, Config};
//!
//! let paths = AgentPaths::new(None)?;
//! let config = Config::load_or_default(&paths)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod display;
pub mod error;
pub mod logging;
pub mod notify;
pub mod schedule;
pub mod shutdown;

pub use error::AgentError;
