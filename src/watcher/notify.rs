//! Slack webhook delivery for watcher alerts

use super::monitor::Alert;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack incoming-webhook payload
#[derive(Debug, Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// Outcome of a delivery attempt that reached a decision
///
/// Every variant counts as delivered for cooldown purposes; only transport
/// errors leave the alert eligible to fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Webhook answered with a non-success status
    Rejected(StatusCode),
    /// No webhook configured; the alert was only logged
    LogOnly,
}

#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post the alert to the webhook
    pub async fn send(&self, alert: &Alert) -> Result<Delivery, reqwest::Error> {
        let message = alert.message();
        let kind = alert.kind();

        let Some(url) = &self.webhook_url else {
            warn!(kind = %kind, message = %message, "Alert (Slack webhook not configured)");
            return Ok(Delivery::LogOnly);
        };

        let response = self
            .client
            .post(url)
            .timeout(SEND_TIMEOUT)
            .json(&SlackMessage { text: &message })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(kind = %kind, "Slack alert sent");
            Ok(Delivery::Sent)
        } else {
            warn!(kind = %kind, status = %status, "Slack webhook rejected alert");
            Ok(Delivery::Rejected(status))
        }
    }
}
