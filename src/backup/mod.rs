//! Backup pipeline for snapkeep
//!
//! Produces compressed artifacts, enforces tiered retention over the
//! artifact directory and mirrors the result to a remote bucket.
//!
//! # Architecture
//!
//! - `naming`: artifact names and their week/month buckets
//! - `inventory`: scanning the artifact directory
//! - `retention`: the daily/weekly/monthly keep-set classifier
//! - `manager`: applying retention to the directory
//! - `archive`: invoking the compression tool
//! - `replicate`: invoking the sync tool
//! - `run`: the create → prune → replicate → notify pipeline
//!
//! # Retention Policy
//!
//! By default the agent keeps:
//! - every artifact from the last 7 days
//! - the latest artifact of each ISO week for the last 4 weeks
//! - the latest artifact of each month for the last 6 × 30 days
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snapkeep::backup::{BackupRun, SystemTools};
//! use snapkeep::config::{AgentPaths, Config};
//!
//! let paths = AgentPaths::new(None)?;
//! let config = Arc::new(Config::load(paths.config_file())?);
//! let tools = SystemTools::new()?;
//!
//! let report = BackupRun::new(config, &paths, tools.toolchain()).execute_guarded();
//! std::process::exit(report.exit_code());
//! ```

pub mod archive;
pub mod inventory;
pub mod manager;
pub mod naming;
pub mod replicate;
pub mod retention;
pub mod run;

pub use archive::{ArchiveProducer, ArchiveStatus, Compressor, ExitSignal, TarZstd};
pub use inventory::{Artifact, Inventory};
pub use manager::{BackupManager, PruneReport};
pub use replicate::{RcloneB2, ReplicationOutcome, Replicator, SyncTool};
pub use retention::{classify, KeepReason, RetentionPlan};
pub use run::{BackupRun, RunReport, RunStage, RunState, SystemTools, Toolchain};
