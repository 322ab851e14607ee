//! Termination signals
//!
//! SIGINT, SIGTERM and SIGHUP set a shared flag instead of killing the
//! process. The daemon leaves its loop at the next wake-up and an in-flight
//! run stops at its next stage boundary, so the failure notification still
//! goes out. A second signal exits at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::error::{AgentError, AgentResult};

/// Exit status after a forced second signal (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Shared stop request
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// A flag no signal handler is attached to
    pub fn new() -> Self {
        Self::default()
    }

    /// Route termination signals to a new flag
    ///
    /// Can only succeed once per process.
    pub fn install() -> AgentResult<Self> {
        let signal = Self::new();
        let flag = Arc::clone(&signal.flag);

        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::SeqCst) {
                warn!("Second termination signal, exiting now");
                std::process::exit(FORCED_EXIT_CODE);
            }
            warn!("Termination requested, stopping after the current stage");
        })
        .map_err(|e| AgentError::Io(format!("cannot install signal handler: {}", e)))?;

        Ok(signal)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The underlying flag, for loops that poll it
    pub fn flag(&self) -> &AtomicBool {
        &self.flag
    }
}
