//! Run notifications
//!
//! Builds a structured summary of a run and hands it to a [`Transport`].
//! Delivery is best-effort: every problem here is logged and swallowed so a
//! notification can never turn a good run into a failed one.

mod discord;

pub use discord::DiscordWebhook;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backup::run::RunState;
use crate::config::settings::is_blank;
use crate::config::NotificationSettings;
use crate::display::format_size;
use crate::error::AgentResult;

const COLOR_SUCCESS: u32 = 0x2ecc71;
const COLOR_FAILURE: u32 = 0xe74c3c;

/// Discord rejects embed field values longer than this many characters
const FIELD_VALUE_LIMIT: usize = 1024;

/// Overall result of a run, as far as notifications are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failure,
}

/// External notification transport
pub trait Transport {
    fn deliver(&self, webhook_url: &str, payload: &Value) -> AgentResult<()>;
}

/// What happened to a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// Notifications are switched off
    Disabled,
    /// Enabled but no webhook is configured
    NoWebhook,
    /// The outcome's `on_success` / `on_failure` flag is off
    Suppressed,
    /// The transport reported an error
    Failed,
}

/// Sends run summaries according to the notification settings
pub struct Notifier<'a> {
    transport: &'a dyn Transport,
}

impl<'a> Notifier<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    pub fn notify(
        &self,
        outcome: RunOutcome,
        state: &RunState,
        settings: &NotificationSettings,
    ) -> Delivery {
        let discord = &settings.discord;

        if !discord.enabled {
            debug!("Notifications disabled");
            return Delivery::Disabled;
        }

        let webhook_url = match &discord.webhook_url {
            Some(url) if !is_blank(&discord.webhook_url) => url,
            _ => {
                warn!("Notifications enabled but no webhook_url configured");
                return Delivery::NoWebhook;
            }
        };

        let wanted = match outcome {
            RunOutcome::Success => discord.on_success,
            RunOutcome::Failure => discord.on_failure,
        };
        if !wanted {
            debug!(?outcome, "Notification suppressed by settings");
            return Delivery::Suppressed;
        }

        let payload = build_payload(outcome, state);
        match self.transport.deliver(webhook_url, &payload) {
            Ok(()) => {
                info!(?outcome, "Notification sent");
                Delivery::Delivered
            }
            Err(e) => {
                warn!("Failed to send notification: {}", e);
                Delivery::Failed
            }
        }
    }
}

/// Cut `value` to at most `limit` characters, marking the cut with `…`
fn truncate_field(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let mut cut: String = value.chars().take(limit.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Build the webhook message for a run
pub fn build_payload(outcome: RunOutcome, state: &RunState) -> Value {
    let (title, color) = match outcome {
        RunOutcome::Success => ("Backup succeeded", COLOR_SUCCESS),
        RunOutcome::Failure => ("Backup failed", COLOR_FAILURE),
    };

    let mut fields = vec![
        json!({
            "name": "Archive",
            "value": state.artifact_name.as_deref().unwrap_or("none"),
            "inline": false,
        }),
        json!({ "name": "Size", "value": format_size(state.size_bytes), "inline": true }),
        json!({ "name": "Duration", "value": format!("{}s", state.duration_secs()), "inline": true }),
        json!({ "name": "Archive created", "value": yes_no(state.archive_created), "inline": true }),
        json!({ "name": "Synced", "value": yes_no(state.synced), "inline": true }),
    ];

    if let Some(entries) = state.entry_count {
        fields.push(json!({ "name": "Entries", "value": entries.to_string(), "inline": true }));
    }

    if let Some(error) = &state.error {
        fields.push(json!({
            "name": "Error",
            "value": truncate_field(error, FIELD_VALUE_LIMIT),
            "inline": false,
        }));
    }

    json!({
        "username": "snapkeep",
        "embeds": [{
            "title": title,
            "color": color,
            "timestamp": Utc::now().to_rfc3339(),
            "footer": { "text": format!("run {}", state.run_id) },
            "fields": fields,
        }]
    })
}
