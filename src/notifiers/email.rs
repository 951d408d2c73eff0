//! A client for submitting HTML mail to the mail gateway.
//!
//! The SMTP-side of delivery lives in the gateway service; this client only
//! hands the rendered message over its HTTP submission endpoint.

use crate::core::{Notifier, RenderedPayload};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Submits rendered emails to the configured mail gateway.
pub struct EmailNotifier {
    gateway_url: String,
    client: reqwest::Client,
}

impl EmailNotifier {
    /// Creates a new `EmailNotifier` with a bounded request timeout.
    pub fn new(gateway_url: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            gateway_url,
            client,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    #[instrument(skip(self, payload))]
    async fn send(&self, payload: RenderedPayload) -> Result<()> {
        let RenderedPayload::Email(message) = payload else {
            anyhow::bail!("email notifier received a non-email payload");
        };

        let body = json!({
            "from": message.from,
            "to": message.to,
            "subject": message.subject,
            "html": message.html,
        });

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(to = %message.to, "email accepted by the mail gateway");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                body = %text,
                "mail gateway rejected the email"
            );
            anyhow::bail!(
                "mail gateway rejected the email: status {}, body: {}",
                status,
                text
            )
        }
    }
}
