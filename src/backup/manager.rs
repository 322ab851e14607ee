//! Backup manager for snapkeep
//!
//! Owns the artifact directory: lists artifacts, plans retention and
//! deletes the artifacts retention gives up on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::inventory::{self, Artifact, Inventory};
use super::retention::{self, RetentionPlan};
use crate::config::RetentionPolicy;
use crate::error::{AgentError, AgentResult};

/// Outcome of enforcing retention on the artifact directory
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Artifacts left in place
    pub kept: Vec<Artifact>,
    /// Paths that were removed
    pub deleted: Vec<PathBuf>,
    /// Deletions that failed; these artifacts are still on disk
    pub failures: Vec<AgentError>,
    /// Files skipped because they are not artifacts
    pub foreign: Vec<PathBuf>,
}

/// Manages the artifact directory and its retention
pub struct BackupManager {
    backup_dir: PathBuf,
    retention: RetentionPolicy,
}

impl BackupManager {
    pub fn new(backup_dir: PathBuf, retention: RetentionPolicy) -> Self {
        Self {
            backup_dir,
            retention,
        }
    }

    /// List artifacts and foreign files, newest artifact first
    pub fn list_backups(&self) -> AgentResult<Inventory> {
        inventory::scan(&self.backup_dir)
    }

    /// Classify the current directory contents without touching them
    pub fn plan(&self, now: DateTime<Utc>) -> AgentResult<(RetentionPlan, Inventory)> {
        let inventory = self.list_backups()?;
        let plan = retention::classify(&inventory.artifacts, &self.retention, now);
        Ok((plan, inventory))
    }

    /// Delete every artifact outside the keep-set
    ///
    /// A failed delete is logged and recorded in the report; the remaining
    /// candidates are still attempted. Foreign files are never touched.
    pub fn enforce_retention(&self, now: DateTime<Utc>) -> AgentResult<PruneReport> {
        let (plan, inventory) = self.plan(now)?;

        for path in &inventory.foreign {
            warn!(path = %path.display(), "Ignoring unrecognised file in backup directory");
        }

        let mut report = PruneReport {
            kept: plan.kept(),
            foreign: inventory.foreign,
            ..PruneReport::default()
        };

        for artifact in plan.prune {
            match fs::remove_file(&artifact.path) {
                Ok(()) => {
                    info!(artifact = %artifact.name, "Deleted expired backup");
                    report.deleted.push(artifact.path);
                }
                Err(e) => {
                    let err = AgentError::Cleanup {
                        path: artifact.path.display().to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{}", err);
                    report.failures.push(err);
                }
            }
        }

        Ok(report)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }
}
