//! Scheduled execution
//!
//! The daemon sleeps until the next cron match of the current snapshot's
//! schedule, then executes one run on the calling thread. Runs therefore
//! never overlap. Publishing a new snapshot wakes the sleeper so a changed
//! schedule is picked up immediately; the run itself always reads the
//! snapshot committed at the moment it starts. Setting the stop flag ends
//! the loop and interrupts a run in progress at its next stage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::{error, info, warn};

use crate::backup::run::{BackupRun, RunReport, Toolchain};
use crate::config::{AgentPaths, ConfigHandle};
use crate::schedule::CronSchedule;

/// Why the daemon woke up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The scheduled time arrived
    Due,
    /// A new configuration snapshot was published
    Reloaded,
    /// Shutdown was requested
    Stopped,
}

pub struct Daemon<'a> {
    paths: AgentPaths,
    handle: ConfigHandle,
    tools: Toolchain<'a>,
    tick: Duration,
}

impl<'a> Daemon<'a> {
    pub fn new(paths: AgentPaths, handle: ConfigHandle, tools: Toolchain<'a>) -> Self {
        Self {
            paths,
            handle,
            tools,
            tick: Duration::from_secs(1),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sleep until `deadline`, a reload, or `stop`
    pub fn sleep_until(&self, deadline: DateTime<Local>, generation: u64, stop: &AtomicBool) -> Wake {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Wake::Stopped;
            }
            if self.handle.generation() != generation {
                return Wake::Reloaded;
            }

            let now = Local::now();
            if now >= deadline {
                return Wake::Due;
            }

            let remaining = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            thread::sleep(remaining.min(self.tick));
        }
    }

    /// Execute one run against the latest snapshot
    ///
    /// `stop` doubles as the run's interrupt flag.
    pub fn run_once(&self, stop: &AtomicBool) -> RunReport {
        let report = BackupRun::new(self.handle.current(), &self.paths, self.tools)
            .with_interrupt(stop)
            .execute_guarded();
        if report.succeeded() {
            info!(run = %report.state.run_id, "Scheduled backup succeeded");
        } else {
            // A failed run never stops the daemon
            warn!(
                run = %report.state.run_id,
                error = report.state.error.as_deref().unwrap_or("unknown"),
                "Scheduled backup failed, waiting for the next slot"
            );
        }
        report
    }

    /// Schedule runs until `stop` is set
    pub fn run(&self, stop: &AtomicBool) {
        info!("Backup daemon started");

        while !stop.load(Ordering::SeqCst) {
            let generation = self.handle.generation();
            let config = self.handle.current();

            let next = match CronSchedule::parse(&config.schedule) {
                Ok(schedule) => schedule.next_after(&Local::now()),
                Err(e) => {
                    error!("Invalid schedule, waiting for a configuration change: {}", e);
                    None
                }
            };

            let wake = match next {
                Some(next) => {
                    info!(next = %next.format("%Y-%m-%d %H:%M %Z"), schedule = %config.schedule, "Next backup scheduled");
                    self.sleep_until(next, generation, stop)
                }
                None => self.wait_for_change(generation, stop),
            };

            match wake {
                Wake::Due => {
                    self.run_once(stop);
                }
                Wake::Reloaded => info!("Configuration changed, recomputing schedule"),
                Wake::Stopped => break,
            }
        }

        info!("Backup daemon stopped");
    }

    fn wait_for_change(&self, generation: u64, stop: &AtomicBool) -> Wake {
        while !stop.load(Ordering::SeqCst) {
            if self.handle.generation() != generation {
                return Wake::Reloaded;
            }
            thread::sleep(self.tick);
        }
        Wake::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::archive::tests::FakeCompressor;
    use crate::backup::archive::ExitSignal;
    use crate::backup::replicate::tests::FakeSync;
    use crate::config::Config;
    use crate::notify::tests::RecordingTransport;
    use tempfile::TempDir;

    fn tools_fixture() -> (FakeCompressor, FakeSync, RecordingTransport) {
        (
            FakeCompressor::new(ExitSignal::Clean, 64),
            FakeSync::ok(),
            RecordingTransport::new(),
        )
    }

    #[test]
    fn test_sleep_until_past_deadline_is_due() {
        let temp = TempDir::new().unwrap();
        let (c, s, t) = tools_fixture();
        let handle = ConfigHandle::new(Config::default());
        let daemon = Daemon::new(
            AgentPaths::with_base_dir(temp.path().to_path_buf()),
            handle.clone(),
            Toolchain {
                compressor: &c,
                sync: &s,
                transport: &t,
            },
        );

        let stop = AtomicBool::new(false);
        let wake = daemon.sleep_until(Local::now() - chrono::Duration::seconds(1), 0, &stop);
        assert_eq!(wake, Wake::Due);
    }

    #[test]
    fn test_publish_wakes_sleeper() {
        let temp = TempDir::new().unwrap();
        let (c, s, t) = tools_fixture();
        let handle = ConfigHandle::new(Config::default());
        let daemon = Daemon::new(
            AgentPaths::with_base_dir(temp.path().to_path_buf()),
            handle.clone(),
            Toolchain {
                compressor: &c,
                sync: &s,
                transport: &t,
            },
        )
        .with_tick(Duration::from_millis(10));

        let generation = handle.generation();
        handle.publish(Config::default());

        let stop = AtomicBool::new(false);
        let wake = daemon.sleep_until(Local::now() + chrono::Duration::hours(1), generation, &stop);
        assert_eq!(wake, Wake::Reloaded);
    }

    #[test]
    fn test_stop_flag() {
        let temp = TempDir::new().unwrap();
        let (c, s, t) = tools_fixture();
        let daemon = Daemon::new(
            AgentPaths::with_base_dir(temp.path().to_path_buf()),
            ConfigHandle::new(Config::default()),
            Toolchain {
                compressor: &c,
                sync: &s,
                transport: &t,
            },
        );

        let stop = AtomicBool::new(true);
        daemon.run(&stop);
        assert_eq!(
            daemon.sleep_until(Local::now() + chrono::Duration::hours(1), 0, &stop),
            Wake::Stopped
        );
    }

    #[test]
    fn test_run_once_uses_latest_snapshot() {
        let temp = TempDir::new().unwrap();
        let (c, s, t) = tools_fixture();
        let handle = ConfigHandle::new(Config::default());

        let mut config = Config::default();
        config.sources = vec![temp.path().join("src")];
        config.backup_dir = Some(temp.path().join("backups"));
        handle.publish(config);

        let daemon = Daemon::new(
            AgentPaths::with_base_dir(temp.path().to_path_buf()),
            handle,
            Toolchain {
                compressor: &c,
                sync: &s,
                transport: &t,
            },
        );

        let report = daemon.run_once(&AtomicBool::new(false));
        assert!(report.succeeded());
        assert!(temp
            .path()
            .join("backups")
            .join(report.state.artifact_name.unwrap())
            .exists());
    }

    #[test]
    fn test_stop_interrupts_run() {
        let temp = TempDir::new().unwrap();
        let (c, s, t) = tools_fixture();

        let mut config = Config::default();
        config.sources = vec![temp.path().join("src")];
        config.backup_dir = Some(temp.path().join("backups"));

        let daemon = Daemon::new(
            AgentPaths::with_base_dir(temp.path().to_path_buf()),
            ConfigHandle::new(config),
            Toolchain {
                compressor: &c,
                sync: &s,
                transport: &t,
            },
        );

        let report = daemon.run_once(&AtomicBool::new(true));
        assert!(!report.succeeded());
        assert_eq!(report.state.error.as_deref(), Some("interrupted by signal"));
        assert_eq!(*c.calls.borrow(), 0);
    }
}
