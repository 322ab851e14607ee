//! Backup CLI commands
//!
//! Implements `run`, `list` and `prune`.

use std::sync::Arc;

use chrono::Utc;

use crate::backup::{BackupManager, BackupRun, SystemTools};
use crate::config::{AgentPaths, Config};
use crate::display::{format_artifact_list, format_size};
use crate::error::AgentResult;
use crate::shutdown::ShutdownSignal;

/// Run one backup now and return the process exit status
pub fn handle_run(paths: &AgentPaths, config: Config) -> AgentResult<i32> {
    let shutdown = ShutdownSignal::install()?;
    let tools = SystemTools::new()?;
    let report = BackupRun::new(Arc::new(config), paths, tools.toolchain())
        .with_interrupt(shutdown.flag())
        .execute_guarded();

    if report.succeeded() {
        println!(
            "Backup complete: {} ({})",
            report.state.artifact_name.as_deref().unwrap_or("-"),
            format_size(report.state.size_bytes)
        );
        if let Some(prune) = &report.prune {
            println!(
                "Retention: kept {}, deleted {}",
                prune.kept.len(),
                prune.deleted.len()
            );
        }
        println!("Remote sync: {}", if report.state.synced { "done" } else { "skipped" });
    } else {
        eprintln!(
            "Backup failed: {}",
            report.state.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(report.exit_code())
}

/// List artifacts with the verdict the current policy gives them
pub fn handle_list(paths: &AgentPaths, config: &Config) -> AgentResult<()> {
    let manager = BackupManager::new(config.backup_dir(paths), config.retention);
    let now = Utc::now();
    let (plan, inventory) = manager.plan(now)?;

    println!("Backup directory: {}", manager.backup_dir().display());
    println!(
        "Retention policy: {} days, {} weeks, {} months",
        config.retention.keep_daily, config.retention.keep_weekly, config.retention.keep_monthly
    );
    println!();
    print!("{}", format_artifact_list(&inventory, &plan, now));
    if inventory.artifacts.is_empty() {
        println!();
    }

    Ok(())
}

/// Apply retention without creating a new artifact
pub fn handle_prune(paths: &AgentPaths, config: &Config, dry_run: bool) -> AgentResult<()> {
    let manager = BackupManager::new(config.backup_dir(paths), config.retention);
    let now = Utc::now();

    if dry_run {
        let (plan, _) = manager.plan(now)?;
        if plan.prune.is_empty() {
            println!("No backups to prune.");
            return Ok(());
        }

        println!("Would delete {} backup(s):", plan.prune.len());
        for artifact in &plan.prune {
            println!("  {} ({})", artifact.name, format_size(artifact.size_bytes));
        }
        println!("Run again without --dry-run to delete them.");
        return Ok(());
    }

    let report = manager.enforce_retention(now)?;
    println!(
        "Deleted {} backup(s), kept {}.",
        report.deleted.len(),
        report.kept.len()
    );
    for failure in &report.failures {
        eprintln!("  {}", failure);
    }

    Ok(())
}
