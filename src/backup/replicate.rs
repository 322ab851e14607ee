//! Remote replication
//!
//! Mirrors the artifact directory, as it stands after pruning, to one
//! remote bucket. The mirror is one-way: remote copies of pruned artifacts
//! are removed too.

use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::config::settings::is_blank;
use crate::config::RemoteSettings;
use crate::error::{AgentError, AgentResult};

/// Remote account credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub account_id: String,
    pub application_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &"***")
            .field("application_key", &"***")
            .finish()
    }
}

/// External sync capability
pub trait SyncTool {
    /// Make `bucket` an exact copy of `local_dir`
    ///
    /// Returns the tool's error output on a non-zero exit.
    fn sync(&self, local_dir: &Path, bucket: &str, credentials: &Credentials) -> Result<(), String>;

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationOutcome {
    Synced,
    /// Remote sync is administratively disabled
    Disabled,
}

/// Replicates the artifact directory through a [`SyncTool`]
pub struct Replicator<'a> {
    tool: &'a dyn SyncTool,
}

impl<'a> Replicator<'a> {
    pub fn new(tool: &'a dyn SyncTool) -> Self {
        Self { tool }
    }

    pub fn replicate(
        &self,
        local_dir: &Path,
        remote: &RemoteSettings,
    ) -> AgentResult<ReplicationOutcome> {
        if !remote.enabled {
            info!("Remote sync disabled, skipping replication");
            return Ok(ReplicationOutcome::Disabled);
        }

        let (bucket, credentials) = resolve(remote)?;

        info!(tool = self.tool.name(), bucket = %bucket, "Syncing backups to remote storage");
        self.tool
            .sync(local_dir, &bucket, &credentials)
            .map_err(AgentError::sync_failed)?;

        info!(bucket = %bucket, "Remote sync complete");
        Ok(ReplicationOutcome::Synced)
    }
}

fn resolve(remote: &RemoteSettings) -> AgentResult<(String, Credentials)> {
    if is_blank(&remote.bucket) {
        return Err(AgentError::MissingBucket);
    }
    if is_blank(&remote.account_id) || is_blank(&remote.application_key) {
        return Err(AgentError::MissingCredentials);
    }

    let bucket = remote.bucket.clone().unwrap_or_default();
    let credentials = Credentials {
        account_id: remote.account_id.clone().unwrap_or_default(),
        application_key: remote.application_key.clone().unwrap_or_default(),
    };
    Ok((bucket, credentials))
}

/// rclone against a Backblaze B2 bucket
///
/// Credentials travel through the environment so they never show up in
/// the process list. `--b2-hard-delete` makes removals real deletions
/// instead of hidden versions.
#[derive(Debug, Clone)]
pub struct RcloneB2 {
    program: String,
}

impl Default for RcloneB2 {
    fn default() -> Self {
        Self {
            program: "rclone".to_string(),
        }
    }
}

impl RcloneB2 {
    fn remote_target(bucket: &str) -> String {
        format!(":b2:{}", bucket.trim_matches('/'))
    }
}

impl SyncTool for RcloneB2 {
    fn sync(&self, local_dir: &Path, bucket: &str, credentials: &Credentials) -> Result<(), String> {
        let output = Command::new(&self.program)
            .arg("sync")
            .arg(local_dir)
            .arg(Self::remote_target(bucket))
            .arg("--b2-hard-delete")
            .env("RCLONE_B2_ACCOUNT", &credentials.account_id)
            .env("RCLONE_B2_KEY", &credentials.application_key)
            .output()
            .map_err(|e| format!("cannot run {}: {}", self.program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// Sync tool that records calls and returns a fixed result
    pub(crate) struct FakeSync {
        pub result: Result<(), String>,
        pub calls: RefCell<Vec<(PathBuf, String)>>,
    }

    impl FakeSync {
        pub(crate) fn ok() -> Self {
            Self {
                result: Ok(()),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn failing(detail: &str) -> Self {
            Self {
                result: Err(detail.to_string()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl SyncTool for FakeSync {
        fn sync(&self, local_dir: &Path, bucket: &str, _: &Credentials) -> Result<(), String> {
            self.calls
                .borrow_mut()
                .push((local_dir.to_path_buf(), bucket.to_string()));
            self.result.clone()
        }

        fn name(&self) -> &str {
            "fake-sync"
        }
    }

    pub(crate) fn enabled_remote() -> RemoteSettings {
        RemoteSettings {
            enabled: true,
            bucket: Some("offsite".into()),
            account_id: Some("acct".into()),
            application_key: Some("key".into()),
        }
    }

    #[test]
    fn test_disabled_is_noop_success() {
        let tool = FakeSync::failing("should not run");
        let outcome = Replicator::new(&tool)
            .replicate(Path::new("/b"), &RemoteSettings::default())
            .unwrap();

        assert_eq!(outcome, ReplicationOutcome::Disabled);
        assert!(tool.calls.borrow().is_empty());
    }

    #[test]
    fn test_missing_bucket() {
        let tool = FakeSync::ok();
        let mut remote = enabled_remote();
        remote.bucket = Some("  ".into());

        let err = Replicator::new(&tool)
            .replicate(Path::new("/b"), &remote)
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingBucket));
    }

    #[test]
    fn test_missing_credentials() {
        let tool = FakeSync::ok();
        let mut remote = enabled_remote();
        remote.application_key = None;

        let err = Replicator::new(&tool)
            .replicate(Path::new("/b"), &remote)
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingCredentials));
        assert!(tool.calls.borrow().is_empty());
    }

    #[test]
    fn test_transport_failure_is_run_fatal() {
        let tool = FakeSync::failing("403 forbidden");
        let err = Replicator::new(&tool)
            .replicate(Path::new("/b"), &enabled_remote())
            .unwrap_err();

        assert!(err.is_run_fatal());
        assert!(err.to_string().contains("403 forbidden"));
    }

    #[test]
    fn test_sync_mirrors_directory() {
        let tool = FakeSync::ok();
        let outcome = Replicator::new(&tool)
            .replicate(Path::new("/b"), &enabled_remote())
            .unwrap();

        assert_eq!(outcome, ReplicationOutcome::Synced);
        assert_eq!(
            *tool.calls.borrow(),
            vec![(PathBuf::from("/b"), "offsite".to_string())]
        );
    }

    #[test]
    fn test_remote_target() {
        assert_eq!(RcloneB2::remote_target("bucket/"), ":b2:bucket");
        assert_eq!(RcloneB2::remote_target("bucket/host1"), ":b2:bucket/host1");
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let creds = Credentials {
            account_id: "acct-1".into(),
            application_key: "k-secret".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("acct-1"));
        assert!(!debug.contains("k-secret"));
    }
}
