//! A client for posting template messages to a chat-bot webhook.

use crate::core::{Notifier, RenderedPayload};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Posts rendered chat messages to the configured bot webhook.
pub struct ChatNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl ChatNotifier {
    /// Creates a new `ChatNotifier` with a bounded request timeout.
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    fn name(&self) -> &str {
        "chat"
    }

    #[instrument(skip(self, payload))]
    async fn send(&self, payload: RenderedPayload) -> Result<()> {
        let RenderedPayload::Chat(message) = payload else {
            anyhow::bail!("chat notifier received a non-chat payload");
        };

        let mut data = serde_json::Map::new();
        for (key, field) in &message.fields {
            data.insert(
                key.clone(),
                json!({ "value": field.value, "color": field.color }),
            );
        }
        let body = json!({
            "touser": message.recipient,
            "template_id": message.template_id,
            "data": data,
        });

        let response = self.client.post(&self.webhook_url).json(&body).send().await?;

        if response.status().is_success() {
            debug!(recipient = %message.recipient, "chat notification accepted");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                body = %text,
                "chat webhook rejected the notification"
            );
            anyhow::bail!(
                "chat webhook rejected the notification: status {}, body: {}",
                status,
                text
            )
        }
    }
}
