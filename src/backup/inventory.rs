//! Artifact inventory
//!
//! Lists the artifact directory and splits it into recognised artifacts
//! and foreign files. Foreign files are never handed to retention, so they
//! are never deleted.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::naming;
use crate::error::{AgentError, AgentResult};

/// One produced backup archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Filename, which encodes the creation time
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// Number of archive entries, when known
    pub entry_count: Option<u64>,
}

impl Artifact {
    /// Build an artifact from a path whose filename follows the naming scheme
    pub fn from_path(path: &Path) -> AgentResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AgentError::MalformedName(path.display().to_string()))?;
        let created_at = naming::parse_name(&name)?;
        let size_bytes = fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            name,
            path: path.to_path_buf(),
            created_at,
            size_bytes,
            entry_count: None,
        })
    }
}

/// Contents of the artifact directory
#[derive(Debug, Default)]
pub struct Inventory {
    /// Recognised artifacts, newest first
    pub artifacts: Vec<Artifact>,
    /// Files that do not follow the naming scheme
    pub foreign: Vec<PathBuf>,
}

impl Inventory {
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.size_bytes).sum()
    }

    pub fn latest(&self) -> Option<&Artifact> {
        self.artifacts.first()
    }
}

/// Scan a directory for artifacts
///
/// A missing directory is an empty inventory. Subdirectories are ignored.
pub fn scan(dir: &Path) -> AgentResult<Inventory> {
    let mut inventory = Inventory::default();

    if !dir.exists() {
        return Ok(inventory);
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        AgentError::Io(format!(
            "Failed to read artifact directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let entry = entry
            .map_err(|e| AgentError::Io(format!("Failed to read directory entry: {}", e)))?;
        let path = entry.path();

        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }

        match Artifact::from_path(&path) {
            Ok(artifact) => inventory.artifacts.push(artifact),
            Err(e) => {
                debug!(path = %path.display(), "Skipping foreign file: {}", e);
                inventory.foreign.push(path);
            }
        }
    }

    inventory
        .artifacts
        .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.name.cmp(&a.name)));
    inventory.foreign.sort();

    Ok(inventory)
}
