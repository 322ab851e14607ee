//! Configuration snapshots and hot reload
//!
//! A [`ConfigHandle`] is a single-slot handoff: the watcher publishes whole
//! new [`Config`] values into it and readers take an `Arc` to whatever is
//! committed at the moment they ask. A backup run clones its snapshot once
//! at start, so a reload only ever affects the next run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use super::settings::Config;

#[derive(Debug)]
struct Slot {
    config: RwLock<Arc<Config>>,
    generation: AtomicU64,
}

/// Shared handle to the latest committed configuration
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    slot: Arc<Slot>,
}

impl ConfigHandle {
    pub fn new(config: Config) -> Self {
        Self {
            slot: Arc::new(Slot {
                config: RwLock::new(Arc::new(config)),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The latest committed snapshot
    pub fn current(&self) -> Arc<Config> {
        match self.slot.config.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the snapshot seen by subsequent readers
    pub fn publish(&self, config: Config) -> u64 {
        let next = Arc::new(config);
        match self.slot.config.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        self.slot.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of snapshots published since creation
    pub fn generation(&self) -> u64 {
        self.slot.generation.load(Ordering::SeqCst)
    }
}

/// Polls the configuration file and publishes a new snapshot on change
pub struct ConfigWatcher {
    path: PathBuf,
    handle: ConfigHandle,
    interval: Duration,
}

/// Stops the watcher thread when dropped
pub struct WatcherGuard {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, handle: ConfigHandle) -> Self {
        Self {
            path,
            handle,
            interval: Duration::from_secs(5),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Check the file once, publishing if it changed since `last_seen`
    ///
    /// Returns the modification time to compare against next time. A
    /// document that fails to parse is logged and the previous snapshot
    /// stays committed.
    pub fn poll(&self, last_seen: Option<SystemTime>) -> Option<SystemTime> {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Config file not readable");
                return last_seen;
            }
        };

        if last_seen == Some(modified) {
            return last_seen;
        }

        match Config::load(&self.path) {
            Ok(config) => {
                for problem in config.validate() {
                    warn!("Reloaded config: {}", problem);
                }
                let generation = self.handle.publish(config);
                info!(path = %self.path.display(), generation, "Configuration reloaded");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring invalid configuration, keeping previous snapshot");
            }
        }

        Some(modified)
    }

    /// Start polling on a background thread
    pub fn spawn(self) -> WatcherGuard {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            let mut last_seen = std::fs::metadata(&self.path)
                .and_then(|m| m.modified())
                .ok();
            let slice = Duration::from_millis(100).min(self.interval);
            let mut waited = Duration::ZERO;

            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(slice);
                waited += slice;
                if waited >= self.interval {
                    waited = Duration::ZERO;
                    last_seen = self.poll(last_seen);
                }
            }
        });

        WatcherGuard {
            stop,
            thread: Some(thread),
        }
    }
}
