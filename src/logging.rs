//! Log setup
//!
//! Installs a `tracing` subscriber writing timestamped, leveled lines to
//! stdout and, when `logging.file` is configured, appending the same lines
//! (without ANSI colours) to that file.
//!
//! Filter priority: `RUST_LOG` env var > `-v` flags > configured level.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogSettings;
use crate::error::{AgentError, AgentResult};

/// Map a configured level name onto a filter directive
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

fn build_filter(settings: &LogSettings, verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    match verbosity {
        0 => EnvFilter::new(level_directive(&settings.level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

/// Initialize process-wide logging
///
/// Call once; the level cannot change afterwards, so a reloaded
/// `logging.level` takes effect on the next process start.
pub fn init(settings: &LogSettings, verbosity: u8) -> AgentResult<()> {
    let file_layer = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AgentError::Io(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AgentError::Io(format!("Failed to open log file {}: {}", path.display(), e))
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(settings, verbosity))
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| AgentError::Config(format!("Failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("warning"), "warn");
        assert_eq!(level_directive(" error "), "error");
        assert_eq!(level_directive("verbose"), "info");
    }
}
