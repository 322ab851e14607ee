use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::warn;

use snapkeep::cli::{
    handle_daemon, handle_init, handle_list, handle_notify_test, handle_prune, handle_run,
    handle_show,
};
use snapkeep::config::{AgentPaths, Config};

#[derive(Parser)]
#[command(
    name = "snapkeep",
    version,
    about = "Scheduled backup agent with tiered retention",
    long_about = "snapkeep compresses configured paths into timestamped archives, \
                  keeps a daily/weekly/monthly selection of them, mirrors the \
                  archive directory to a B2 bucket and reports each run to Discord."
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = "SNAPKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backup now (default)
    Run,

    /// Run backups on the configured schedule
    Daemon,

    /// List backups and their retention verdict
    #[command(alias = "ls")]
    List,

    /// Apply the retention policy without creating a backup
    Prune {
        /// Show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },

    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration and paths
    Config,

    /// Send a test notification to the configured webhook
    NotifyTest,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AgentPaths::new(cli.config)?;

    if let Some(Commands::Init { force }) = cli.command {
        handle_init(&paths, force)?;
        return Ok(());
    }

    let config = Config::load_or_default(&paths)?;
    snapkeep::logging::init(&config.logging, cli.verbose)?;

    for problem in config.validate() {
        warn!("Configuration: {}", problem);
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let code = handle_run(&paths, config)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Daemon => handle_daemon(&paths, config)?,
        Commands::List => handle_list(&paths, &config)?,
        Commands::Prune { dry_run } => handle_prune(&paths, &config, dry_run)?,
        Commands::Config => handle_show(&paths, &config)?,
        Commands::NotifyTest => handle_notify_test(&config)?,
        Commands::Init { .. } => {}
    }

    Ok(())
}
