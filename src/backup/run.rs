//! Backup run orchestration
//!
//! One run walks `Created → Archiving → Pruning → Replicating → Notifying →
//! Done`. A fatal archive or replication error moves the run to `Failed`,
//! sends a failure notification and skips every later stage; in particular
//! nothing is pruned when no new artifact was captured. Pruning problems
//! and notification problems are logged and never fail the run.
//!
//! The run reads one [`Config`] snapshot for its whole lifetime and keeps
//! all its state in a [`RunState`] value. An interrupt flag set by a
//! termination signal is checked between stages and fails the run with the
//! usual failure notification.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::archive::{ArchiveProducer, ArchiveStatus, Compressor, TarZstd};
use super::manager::{BackupManager, PruneReport};
use super::naming::format_name;
use super::replicate::{RcloneB2, ReplicationOutcome, Replicator, SyncTool};
use crate::config::{AgentPaths, Config};
use crate::display::format_size;
use crate::error::AgentResult;
use crate::notify::{Delivery, DiscordWebhook, Notifier, RunOutcome, Transport};

/// State carried through one run
#[derive(Debug, Clone)]
pub struct RunState {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    started: Instant,
    pub artifact_name: Option<String>,
    pub archive_created: bool,
    pub synced: bool,
    pub size_bytes: u64,
    pub entry_count: Option<u64>,
    pub error: Option<String>,
}

impl RunState {
    pub fn start() -> Self {
        Self::start_at(Utc::now())
    }

    pub fn start_at(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            started: Instant::now(),
            artifact_name: None,
            archive_created: false,
            synced: false,
            size_bytes: 0,
            entry_count: None,
            error: None,
        }
    }

    /// Wall time since the run started, in whole seconds
    pub fn duration_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Created,
    Archiving,
    Pruning,
    Replicating,
    Notifying,
    Done,
    Failed,
}

/// Everything known about a finished run
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    /// `Done` or `Failed`
    pub stage: RunStage,
    /// Stage that failed, if any
    pub failed_at: Option<RunStage>,
    pub prune: Option<PruneReport>,
    pub notification: Delivery,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.stage == RunStage::Done
    }

    /// Process exit status for this run
    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            0
        } else {
            1
        }
    }
}

/// External capabilities a run depends on
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    pub compressor: &'a dyn Compressor,
    pub sync: &'a dyn SyncTool,
    pub transport: &'a dyn Transport,
}

/// Production tools: GNU tar + zstd, rclone and a Discord webhook
pub struct SystemTools {
    tar: TarZstd,
    rclone: RcloneB2,
    discord: DiscordWebhook,
}

impl SystemTools {
    pub fn new() -> AgentResult<Self> {
        Ok(Self {
            tar: TarZstd::default(),
            rclone: RcloneB2::default(),
            discord: DiscordWebhook::new()?,
        })
    }

    pub fn toolchain(&self) -> Toolchain<'_> {
        Toolchain {
            compressor: &self.tar,
            sync: &self.rclone,
            transport: &self.discord,
        }
    }
}

/// One backup run over a configuration snapshot
pub struct BackupRun<'a> {
    config: Arc<Config>,
    backup_dir: PathBuf,
    tools: Toolchain<'a>,
    interrupt: Option<&'a AtomicBool>,
}

impl<'a> BackupRun<'a> {
    pub fn new(config: Arc<Config>, paths: &AgentPaths, tools: Toolchain<'a>) -> Self {
        let backup_dir = config.backup_dir(paths);
        Self {
            config,
            backup_dir,
            tools,
            interrupt: None,
        }
    }

    /// Stop at the next stage boundary once `flag` is set
    pub fn with_interrupt(mut self, flag: &'a AtomicBool) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt.map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    fn abort(&self, mut state: RunState, at: RunStage, prune: Option<PruneReport>) -> RunReport {
        warn!(stage = ?at, "Backup run interrupted by signal");
        state.error = Some(match state.error.take() {
            Some(previous) => format!("interrupted by signal: {}", previous),
            None => "interrupted by signal".to_string(),
        });
        self.fail(state, at, prune)
    }

    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }

    /// Run the pipeline now
    pub fn execute(&self) -> RunReport {
        self.execute_at(Utc::now())
    }

    /// Run the pipeline, naming the artifact and pruning relative to `now`
    pub fn execute_at(&self, now: DateTime<Utc>) -> RunReport {
        let mut state = RunState::start_at(now);
        let span = info_span!("run", id = %state.run_id);
        let _enter = span.enter();

        info!(backup_dir = %self.backup_dir.display(), "Backup run started");

        if self.interrupted() {
            return self.abort(state, RunStage::Archiving, None);
        }

        // Archiving
        let name = format_name(now);
        state.artifact_name = Some(name.clone());
        let producer = ArchiveProducer::new(self.tools.compressor);
        match producer.produce(
            &self.config.sources,
            &self.config.excludes,
            &self.backup_dir.join(&name),
        ) {
            Ok(produced) => {
                state.archive_created = true;
                state.size_bytes = produced.size_bytes;
                state.entry_count = produced.entry_count;
                match produced.status {
                    ArchiveStatus::Success => info!(
                        artifact = %name,
                        size = %format_size(produced.size_bytes),
                        "Archive created"
                    ),
                    ArchiveStatus::Warning => warn!(
                        artifact = %name,
                        size = %format_size(produced.size_bytes),
                        "Archive created with warnings"
                    ),
                }
            }
            Err(e) => {
                error!("Archive creation failed: {}", e);
                state.error = Some(e.to_string());
                if self.interrupted() {
                    return self.abort(state, RunStage::Archiving, None);
                }
                return self.fail(state, RunStage::Archiving, None);
            }
        }

        if self.interrupted() {
            return self.abort(state, RunStage::Pruning, None);
        }

        // Pruning
        let manager = BackupManager::new(self.backup_dir.clone(), self.config.retention);
        let prune = match manager.enforce_retention(now) {
            Ok(report) => {
                info!(
                    kept = report.kept.len(),
                    deleted = report.deleted.len(),
                    failed = report.failures.len(),
                    "Retention applied"
                );
                Some(report)
            }
            Err(e) => {
                warn!("Pruning skipped: {}", e);
                None
            }
        };

        if self.interrupted() {
            return self.abort(state, RunStage::Replicating, prune);
        }

        // Replicating
        let replicator = Replicator::new(self.tools.sync);
        match replicator.replicate(&self.backup_dir, &self.config.remote) {
            Ok(ReplicationOutcome::Synced) => state.synced = true,
            Ok(ReplicationOutcome::Disabled) => {}
            Err(e) if e.is_run_fatal() => {
                error!("Remote sync failed: {}", e);
                state.error = Some(e.to_string());
                return self.fail(state, RunStage::Replicating, prune);
            }
            Err(e) => {
                warn!("Remote sync skipped: {}", e);
                state.error = Some(format!("remote sync skipped: {}", e));
            }
        }

        // Notifying
        let notification = Notifier::new(self.tools.transport).notify(
            RunOutcome::Success,
            &state,
            &self.config.notifications,
        );

        info!(
            duration_secs = state.duration_secs(),
            synced = state.synced,
            "Backup run finished"
        );

        RunReport {
            state,
            stage: RunStage::Done,
            failed_at: None,
            prune,
            notification,
        }
    }

    fn fail(&self, state: RunState, at: RunStage, prune: Option<PruneReport>) -> RunReport {
        let notification = Notifier::new(self.tools.transport).notify(
            RunOutcome::Failure,
            &state,
            &self.config.notifications,
        );

        error!(stage = ?at, duration_secs = state.duration_secs(), "Backup run failed");

        RunReport {
            state,
            stage: RunStage::Failed,
            failed_at: Some(at),
            prune,
            notification,
        }
    }

    /// Run the pipeline, turning a panic into a failed run
    ///
    /// A failure notification is still attempted for a panic anywhere in
    /// the pipeline.
    pub fn execute_guarded(&self) -> RunReport {
        self.execute_guarded_at(Utc::now())
    }

    pub fn execute_guarded_at(&self, now: DateTime<Utc>) -> RunReport {
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute_at(now))) {
            Ok(report) => report,
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());

                let mut state = RunState::start_at(now);
                state.error = Some(format!("run aborted unexpectedly: {}", reason));
                error!("{}", state.error.as_deref().unwrap_or_default());
                self.fail(state, RunStage::Created, None)
            }
        }
    }
}
