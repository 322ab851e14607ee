//! Discord webhook transport

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;

use super::Transport;
use crate::error::{AgentError, AgentResult};

/// Posts JSON messages to a Discord webhook
pub struct DiscordWebhook {
    client: Client,
}

impl DiscordWebhook {
    pub fn new() -> AgentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("snapkeep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AgentError::Notify(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl Transport for DiscordWebhook {
    fn deliver(&self, webhook_url: &str, payload: &Value) -> AgentResult<()> {
        let response = self
            .client
            .post(webhook_url)
            .json(payload)
            .send()
            .map_err(|e| AgentError::Notify(format!("Failed to reach webhook: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Notify(format!(
                "Webhook returned {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(())
    }
}
