//! Archive producer
//!
//! Compression itself is delegated to an external tool behind the
//! [`Compressor`] trait. The producer guards the inputs, maps the tool's
//! three-way exit signal and makes sure a fatal run leaves no file that
//! retention could mistake for an artifact.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};

/// Exit signal reported by a compression tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitSignal {
    Clean,
    /// The archive was written but some inputs had problems
    Warning(String),
    Fatal(String),
}

/// External compression capability
pub trait Compressor {
    /// Write `sources` into one archive at `destination`
    fn compress(&self, sources: &[PathBuf], excludes: &[String], destination: &Path) -> ExitSignal;

    /// Count the entries of a finished archive, if the tool can
    fn entry_count(&self, archive: &Path) -> Option<u64>;

    /// Tool name for logs
    fn name(&self) -> &str;
}

/// How the compression tool finished for a produced archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStatus {
    Success,
    Warning,
}

/// A produced artifact and its metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedArchive {
    pub status: ArchiveStatus,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub entry_count: Option<u64>,
}

/// Runs the compression tool for one artifact
pub struct ArchiveProducer<'a> {
    compressor: &'a dyn Compressor,
}

impl<'a> ArchiveProducer<'a> {
    pub fn new(compressor: &'a dyn Compressor) -> Self {
        Self { compressor }
    }

    /// Produce the artifact at `destination`
    ///
    /// The tool writes to a `.partial` sibling which is renamed into place
    /// only on a clean or warning exit. A fatal exit is returned as
    /// [`AgentError::ToolFailure`] and the partial file is removed.
    pub fn produce(
        &self,
        sources: &[PathBuf],
        excludes: &[String],
        destination: &Path,
    ) -> AgentResult<ProducedArchive> {
        if sources.is_empty() {
            return Err(AgentError::Source);
        }

        // Artifacts are immutable once written
        if destination.exists() {
            return Err(AgentError::archive_failed(format!(
                "{} already exists",
                destination.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AgentError::archive_failed(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let partial = partial_path(destination);
        info!(
            tool = self.compressor.name(),
            sources = sources.len(),
            excludes = excludes.len(),
            destination = %destination.display(),
            "Creating archive"
        );

        let status = match self.compressor.compress(sources, excludes, &partial) {
            ExitSignal::Clean => ArchiveStatus::Success,
            ExitSignal::Warning(detail) => {
                warn!(tool = self.compressor.name(), "Archive created with warnings: {}", detail);
                ArchiveStatus::Warning
            }
            ExitSignal::Fatal(detail) => {
                discard(&partial);
                return Err(AgentError::archive_failed(detail));
            }
        };

        if destination.exists() {
            discard(&partial);
            return Err(AgentError::archive_failed(format!(
                "{} appeared while archiving",
                destination.display()
            )));
        }

        if let Err(e) = fs::rename(&partial, destination) {
            discard(&partial);
            return Err(AgentError::archive_failed(format!(
                "cannot move archive into place: {}",
                e
            )));
        }

        let size_bytes = fs::metadata(destination).map(|m| m.len()).unwrap_or(0);
        let entry_count = self.compressor.entry_count(destination);
        debug!(size_bytes, ?entry_count, "Archive metrics recorded");

        Ok(ProducedArchive {
            status,
            path: destination.to_path_buf(),
            size_bytes,
            entry_count,
        })
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name: OsString = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn discard(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), "Failed to remove partial archive: {}", e);
        }
    }
}

/// GNU tar with zstd compression
///
/// tar exits 1 when some input changed while being read and 2 on fatal
/// errors; unreadable inputs are downgraded to warnings with
/// `--ignore-failed-read`.
#[derive(Debug, Clone)]
pub struct TarZstd {
    program: String,
}

impl Default for TarZstd {
    fn default() -> Self {
        Self {
            program: "tar".to_string(),
        }
    }
}

impl TarZstd {
    #[cfg(test)]
    pub(crate) fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn build_args(sources: &[PathBuf], excludes: &[String], destination: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--zstd".into(),
            "--ignore-failed-read".into(),
            "-cf".into(),
            destination.as_os_str().to_owned(),
        ];
        args.extend(excludes.iter().map(|p| OsString::from(format!("--exclude={}", p))));
        args.extend(sources.iter().map(|s| s.as_os_str().to_owned()));
        args
    }
}

/// Map a tar exit code onto the three-way signal
pub fn signal_from_exit(code: Option<i32>, stderr: &str) -> ExitSignal {
    let detail = stderr.trim().to_string();
    match code {
        Some(0) => ExitSignal::Clean,
        Some(1) => ExitSignal::Warning(detail),
        Some(code) => ExitSignal::Fatal(format!("exit status {}: {}", code, detail)),
        None => ExitSignal::Fatal(format!("terminated by signal: {}", detail)),
    }
}

impl Compressor for TarZstd {
    fn compress(&self, sources: &[PathBuf], excludes: &[String], destination: &Path) -> ExitSignal {
        let output = Command::new(&self.program)
            .args(Self::build_args(sources, excludes, destination))
            .output();

        match output {
            Ok(output) => {
                signal_from_exit(output.status.code(), &String::from_utf8_lossy(&output.stderr))
            }
            Err(e) => ExitSignal::Fatal(format!("cannot run {}: {}", self.program, e)),
        }
    }

    fn entry_count(&self, archive: &Path) -> Option<u64> {
        let output = Command::new(&self.program)
            .arg("--zstd")
            .arg("-tf")
            .arg(archive)
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(output.stdout.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count() as u64)
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Compressor that writes a fixed number of bytes and reports a fixed signal
    pub(crate) struct FakeCompressor {
        pub signal: ExitSignal,
        pub bytes: usize,
        pub calls: RefCell<u32>,
    }

    impl FakeCompressor {
        pub(crate) fn new(signal: ExitSignal, bytes: usize) -> Self {
            Self {
                signal,
                bytes,
                calls: RefCell::new(0),
            }
        }
    }

    impl Compressor for FakeCompressor {
        fn compress(&self, _: &[PathBuf], _: &[String], destination: &Path) -> ExitSignal {
            *self.calls.borrow_mut() += 1;
            fs::write(destination, vec![0u8; self.bytes]).unwrap();
            self.signal.clone()
        }

        fn entry_count(&self, _: &Path) -> Option<u64> {
            Some(3)
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn sources() -> Vec<PathBuf> {
        vec![PathBuf::from("/etc")]
    }

    #[test]
    fn test_no_sources_is_fatal() {
        let temp = TempDir::new().unwrap();
        let compressor = FakeCompressor::new(ExitSignal::Clean, 10);
        let producer = ArchiveProducer::new(&compressor);

        let err = producer
            .produce(&[], &[], &temp.path().join("a.tar.zst"))
            .unwrap_err();

        assert!(matches!(err, AgentError::Source));
        assert_eq!(*compressor.calls.borrow(), 0);
    }

    #[test]
    fn test_clean_exit() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("nested").join("a.tar.zst");
        let compressor = FakeCompressor::new(ExitSignal::Clean, 2048);

        let produced = ArchiveProducer::new(&compressor)
            .produce(&sources(), &[], &dest)
            .unwrap();

        assert_eq!(produced.status, ArchiveStatus::Success);
        assert_eq!(produced.size_bytes, 2048);
        assert_eq!(produced.entry_count, Some(3));
        assert!(dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_warning_exit_still_produces() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.tar.zst");
        let compressor = FakeCompressor::new(ExitSignal::Warning("file changed".into()), 1024);

        let produced = ArchiveProducer::new(&compressor)
            .produce(&sources(), &["*.tmp".into()], &dest)
            .unwrap();

        assert_eq!(produced.status, ArchiveStatus::Warning);
        assert_eq!(produced.size_bytes, 1024);
    }

    #[test]
    fn test_existing_artifact_is_not_replaced() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.tar.zst");
        fs::write(&dest, b"earlier run").unwrap();
        let compressor = FakeCompressor::new(ExitSignal::Clean, 64);

        let err = ArchiveProducer::new(&compressor)
            .produce(&sources(), &[], &dest)
            .unwrap_err();

        assert!(matches!(err, AgentError::ToolFailure { .. }));
        assert_eq!(*compressor.calls.borrow(), 0);
        assert_eq!(fs::read(&dest).unwrap(), b"earlier run");
    }

    #[test]
    fn test_fatal_exit_leaves_no_file() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("a.tar.zst");
        let compressor = FakeCompressor::new(ExitSignal::Fatal("disk full".into()), 512);

        let err = ArchiveProducer::new(&compressor)
            .produce(&sources(), &[], &dest)
            .unwrap_err();

        assert!(err.is_run_fatal());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_signal_from_exit() {
        assert_eq!(signal_from_exit(Some(0), ""), ExitSignal::Clean);
        assert_eq!(
            signal_from_exit(Some(1), "file changed as we read it\n"),
            ExitSignal::Warning("file changed as we read it".into())
        );
        assert!(matches!(signal_from_exit(Some(2), "x"), ExitSignal::Fatal(_)));
        assert!(matches!(signal_from_exit(None, ""), ExitSignal::Fatal(_)));
    }

    #[test]
    fn test_tar_args_put_excludes_before_sources() {
        let args = TarZstd::build_args(
            &[PathBuf::from("/srv")],
            &["*.log".to_string()],
            Path::new("/b/a.tar.zst"),
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "--zstd",
                "--ignore-failed-read",
                "-cf",
                "/b/a.tar.zst",
                "--exclude=*.log",
                "/srv"
            ]
        );
    }

    #[test]
    fn test_missing_program_is_fatal() {
        let temp = TempDir::new().unwrap();
        let tar = TarZstd::with_program("definitely-not-a-real-tar-binary");
        let signal = tar.compress(&sources(), &[], &temp.path().join("a.tar.zst"));
        assert!(matches!(signal, ExitSignal::Fatal(_)));
    }
}
