//! Daemon CLI command

use tracing::{info, warn};

use crate::backup::SystemTools;
use crate::config::{AgentPaths, Config, ConfigHandle, ConfigWatcher};
use crate::daemon::Daemon;
use crate::error::AgentResult;
use crate::shutdown::ShutdownSignal;

/// Run the scheduler with config hot reload until a termination signal
pub fn handle_daemon(paths: &AgentPaths, config: Config) -> AgentResult<()> {
    if !paths.is_initialized() {
        warn!(
            path = %paths.config_file().display(),
            "No configuration file, running with defaults and watching for one"
        );
    }

    let shutdown = ShutdownSignal::install()?;
    let handle = ConfigHandle::new(config);
    let _watcher = ConfigWatcher::new(paths.config_file().to_path_buf(), handle.clone()).spawn();

    let tools = SystemTools::new()?;
    Daemon::new(paths.clone(), handle, tools.toolchain()).run(shutdown.flag());

    info!("Shutdown complete");
    Ok(())
}
