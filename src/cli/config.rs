//! Configuration CLI commands
//!
//! Implements `init`, `config` and `notify-test`.

use crate::backup::RunState;
use crate::config::settings::is_blank;
use crate::config::{AgentPaths, Config};
use crate::error::{AgentError, AgentResult};
use crate::notify::{build_payload, DiscordWebhook, RunOutcome, Transport};

/// Write a default configuration document
pub fn handle_init(paths: &AgentPaths, force: bool) -> AgentResult<()> {
    let path = paths.config_file();

    if path.exists() && !force {
        println!("Configuration already exists at: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    Config::default().save(path)?;
    std::fs::create_dir_all(paths.default_backup_dir())?;

    println!("Configuration written to: {}", path.display());
    println!();
    println!("Add at least one entry under 'sources' before the first run.");
    println!("Run 'snapkeep config' to review the effective settings.");
    Ok(())
}

fn mask(value: &Option<String>) -> &'static str {
    if is_blank(value) {
        "(not set)"
    } else {
        "********"
    }
}

/// Show resolved paths and effective settings, secrets masked
pub fn handle_show(paths: &AgentPaths, config: &Config) -> AgentResult<()> {
    println!("snapkeep Configuration");
    println!("======================");
    println!(
        "Config file:      {}{}",
        paths.config_file().display(),
        if paths.is_initialized() { "" } else { " (missing, using defaults)" }
    );
    println!("Backup directory: {}", config.backup_dir(paths).display());
    println!("Schedule:         {}", config.schedule);
    println!();

    println!("Sources:");
    if config.sources.is_empty() {
        println!("  (none)");
    }
    for source in &config.sources {
        println!("  {}", source.display());
    }
    if !config.excludes.is_empty() {
        println!("Excludes:         {}", config.excludes.join(", "));
    }
    println!();

    println!(
        "Retention:        {} days, {} weeks, {} months",
        config.retention.keep_daily, config.retention.keep_weekly, config.retention.keep_monthly
    );

    let remote = &config.remote;
    println!("Remote sync:      {}", if remote.enabled { "enabled" } else { "disabled" });
    if remote.enabled {
        println!("  Bucket:         {}", remote.bucket.as_deref().unwrap_or("(not set)"));
        println!("  Account ID:     {}", mask(&remote.account_id));
        println!("  App key:        {}", mask(&remote.application_key));
    }

    let discord = &config.notifications.discord;
    println!("Notifications:    {}", if discord.enabled { "enabled" } else { "disabled" });
    if discord.enabled {
        println!("  Webhook:        {}", mask(&discord.webhook_url));
        println!("  On success:     {}", discord.on_success);
        println!("  On failure:     {}", discord.on_failure);
    }

    println!(
        "Logging:          {}{}",
        config.logging.level,
        config
            .logging
            .file
            .as_ref()
            .map(|f| format!(" -> {}", f.display()))
            .unwrap_or_default()
    );

    let problems = config.validate();
    if !problems.is_empty() {
        println!();
        println!("Warnings:");
        for problem in problems {
            println!("  - {}", problem);
        }
    }

    Ok(())
}

/// Send a sample notification, ignoring the per-outcome flags
pub fn handle_notify_test(config: &Config) -> AgentResult<()> {
    let discord = &config.notifications.discord;
    let webhook_url = match &discord.webhook_url {
        Some(url) if !is_blank(&discord.webhook_url) => url,
        _ => {
            return Err(AgentError::Config(
                "notifications.discord.webhook_url is not set".into(),
            ))
        }
    };

    let mut state = RunState::start();
    state.artifact_name = Some("snapkeep-test".to_string());

    DiscordWebhook::new()?.deliver(webhook_url, &build_payload(RunOutcome::Success, &state))?;
    println!("Test notification sent.");
    Ok(())
}
