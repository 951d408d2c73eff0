//! The exception notification dispatcher.
//!
//! `Dispatcher::handle` is the single entry point the surrounding
//! application calls when it catches an unhandled error. It logs the
//! occurrence, applies the suppression rules, selects the configured
//! channel, enriches the occurrence with geolocation context, renders the
//! channel payload and detaches delivery. Nothing that happens in here ever
//! propagates back to the caller.

use crate::config::{Channel, Config};
use crate::core::{ErrorOccurrence, GeoResolver, Notifier, RenderedPayload, RequestContext};
use crate::geo;
use crate::notifiers::{ChatNotifier, EmailNotifier};
use crate::render;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// What the dispatch pipeline decided for one occurrence.
///
/// Local-only; `handle` surfaces nothing to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Notification is globally disabled.
    Disabled,
    /// The error type is on the suppression list.
    Suppressed,
    /// No channel is configured.
    NoChannel,
    /// The geolocation lookup failed, the attempt was abandoned.
    EnrichmentFailed,
    /// A delivery task was spawned for the selected channel.
    Dispatched,
}

/// The exception notification dispatcher.
///
/// Holds the immutable configuration and the injected collaborators; safe to
/// share across concurrently handled occurrences.
pub struct Dispatcher {
    config: Arc<Config>,
    geo: Arc<dyn GeoResolver>,
    chat: Arc<dyn Notifier>,
    email: Arc<dyn Notifier>,
}

impl Dispatcher {
    /// Creates a dispatcher from explicit collaborators.
    pub fn new(
        config: Arc<Config>,
        geo: Arc<dyn GeoResolver>,
        chat: Arc<dyn Notifier>,
        email: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            geo,
            chat,
            email,
        }
    }

    /// Creates a dispatcher wired to the real HTTP collaborators.
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let timeout = Duration::from_secs(config.delivery.timeout_secs);
        let geo = geo::from_config(&config.geo)?;
        let chat = Arc::new(ChatNotifier::new(
            config.notify.chat.webhook_url.clone(),
            timeout,
        )?);
        let email = Arc::new(EmailNotifier::new(
            config.notify.email.gateway_url.clone(),
            timeout,
        )?);
        Ok(Self::new(config, geo, chat, email))
    }

    /// Handles one error occurrence.
    ///
    /// Never propagates an error; the raising code path continues as if the
    /// dispatcher were not there.
    #[instrument(skip_all, fields(error = %error.name))]
    pub async fn handle(&self, error: &ErrorOccurrence, ctx: &RequestContext) {
        let outcome = self.process(error, ctx).await;
        debug!(?outcome, "occurrence processed");
    }

    async fn process(&self, error: &ErrorOccurrence, ctx: &RequestContext) -> DispatchOutcome {
        // Every occurrence is logged, even when notification is disabled,
        // suppressed, or fails further down.
        error!(
            name = %error.name,
            detail = %error.message,
            stack = %error.stack_trace,
            "application exception"
        );

        if !self.config.notify.enabled {
            return DispatchOutcome::Disabled;
        }

        if self.config.notify.suppressed_errors.contains(&error.name) {
            debug!(name = %error.name, "exception type is suppressed");
            return DispatchOutcome::Suppressed;
        }

        let Some(notifier) = self.notifier_for(self.config.notify.channel) else {
            debug!("no notification channel selected");
            return DispatchOutcome::NoChannel;
        };

        // Region data is mandatory context; without it no payload is sent.
        let region = match self.geo.resolve(ctx.source_ip).await {
            Ok(region) => region,
            Err(e) => {
                error!(ip = %ctx.source_ip, error = %e, "geolocation lookup failed, dropping notification");
                metrics::counter!("geo_lookup_failures_total").increment(1);
                return DispatchOutcome::EnrichmentFailed;
            }
        };

        let payload = match self.config.notify.channel {
            Channel::Chat => {
                RenderedPayload::Chat(render::chat_message(&self.config, error, ctx, &region))
            }
            Channel::Email => {
                RenderedPayload::Email(render::email_message(&self.config, error, ctx, &region))
            }
            Channel::None => return DispatchOutcome::NoChannel,
        };

        self.spawn_delivery(Arc::clone(notifier), payload);
        DispatchOutcome::Dispatched
    }

    fn notifier_for(&self, channel: Channel) -> Option<&Arc<dyn Notifier>> {
        match channel {
            Channel::Chat => Some(&self.chat),
            Channel::Email => Some(&self.email),
            Channel::None => None,
        }
    }

    /// Detaches delivery from the raising code path.
    ///
    /// The task is never joined; its outcome is observed only for logging
    /// and metrics. A hung transport is cut off by the delivery timeout.
    fn spawn_delivery(&self, notifier: Arc<dyn Notifier>, payload: RenderedPayload) {
        let timeout = Duration::from_secs(self.config.delivery.timeout_secs);
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.send(payload)).await {
                Ok(Ok(())) => {
                    debug!(channel = notifier.name(), "notification delivered");
                    metrics::counter!("notifications_sent_total").increment(1);
                }
                Ok(Err(e)) => {
                    error!(
                        channel = notifier.name(),
                        "notification delivery failed: {e:#}"
                    );
                    metrics::counter!("notification_failures_total").increment(1);
                }
                Err(_) => {
                    error!(
                        channel = notifier.name(),
                        timeout_secs = timeout.as_secs(),
                        "notification delivery timed out"
                    );
                    metrics::counter!("notification_failures_total").increment(1);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GeoRegion;
    use crate::geo::GeoError;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::net::IpAddr;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct FakeGeoResolver {
        result: Result<GeoRegion, GeoError>,
    }

    #[async_trait]
    impl GeoResolver for FakeGeoResolver {
        async fn resolve(&self, _ip: IpAddr) -> Result<GeoRegion, GeoError> {
            self.result.clone()
        }
    }

    struct RecordingNotifier {
        name: &'static str,
        sent: mpsc::UnboundedSender<RenderedPayload>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, payload: RenderedPayload) -> anyhow::Result<()> {
            self.sent.send(payload).ok();
            if self.fail {
                anyhow::bail!("simulated delivery failure")
            }
            Ok(())
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        chat_rx: mpsc::UnboundedReceiver<RenderedPayload>,
        email_rx: mpsc::UnboundedReceiver<RenderedPayload>,
    }

    fn test_region() -> GeoRegion {
        GeoRegion {
            region: "CN".to_string(),
            province: "GD".to_string(),
            city: "SZ".to_string(),
            isp: "Telecom".to_string(),
        }
    }

    fn harness(config: Config, geo: Result<GeoRegion, GeoError>, failing_delivery: bool) -> Harness {
        let (chat_tx, chat_rx) = mpsc::unbounded_channel();
        let (email_tx, email_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            Arc::new(config),
            Arc::new(FakeGeoResolver { result: geo }),
            Arc::new(RecordingNotifier {
                name: "chat",
                sent: chat_tx,
                fail: failing_delivery,
            }),
            Arc::new(RecordingNotifier {
                name: "email",
                sent: email_tx,
                fail: failing_delivery,
            }),
        );
        Harness {
            dispatcher,
            chat_rx,
            email_rx,
        }
    }

    fn enabled_config(channel: Channel) -> Config {
        let mut config = Config::default();
        config.app_name = "orders-api".to_string();
        config.notify.enabled = true;
        config.notify.channel = channel;
        config
    }

    fn occurrence(name: &str) -> ErrorOccurrence {
        ErrorOccurrence::new(name, "boom", "at OrderController.show")
    }

    fn ctx() -> RequestContext {
        RequestContext {
            source_ip: "1.2.3.4".parse().unwrap(),
            url: "https://api.example.com/orders/7".to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn recv_payload(rx: &mut mpsc::UnboundedReceiver<RenderedPayload>) -> RenderedPayload {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("delivery task should have run")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_disabled_config_never_notifies() {
        let mut config = enabled_config(Channel::Chat);
        config.notify.enabled = false;
        let mut h = harness(config, Ok(test_region()), false);

        let outcome = h.dispatcher.process(&occurrence("TypeError"), &ctx()).await;

        assert_eq!(outcome, DispatchOutcome::Disabled);
        assert!(h.chat_rx.try_recv().is_err());
        assert!(h.email_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_suppressed_error_is_not_notified() {
        let mut h = harness(enabled_config(Channel::Chat), Ok(test_region()), false);

        let outcome = h
            .dispatcher
            .process(&occurrence("ValidationException"), &ctx())
            .await;

        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert!(h.chat_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_channel_performs_no_delivery() {
        let mut h = harness(enabled_config(Channel::None), Ok(test_region()), false);

        let outcome = h.dispatcher.process(&occurrence("TypeError"), &ctx()).await;

        assert_eq!(outcome, DispatchOutcome::NoChannel);
        assert!(h.chat_rx.try_recv().is_err());
        assert!(h.email_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_chat_channel_invokes_exactly_the_chat_notifier() {
        let mut h = harness(enabled_config(Channel::Chat), Ok(test_region()), false);

        let outcome = h.dispatcher.process(&occurrence("TypeError"), &ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);

        let payload = recv_payload(&mut h.chat_rx).await;
        let RenderedPayload::Chat(message) = payload else {
            panic!("chat notifier should receive a chat payload");
        };
        let region = message
            .fields
            .iter()
            .find(|(k, _)| k == "region")
            .map(|(_, f)| f.value.clone())
            .unwrap();
        assert_eq!(region, "CN - GDSZ - Telecom");
        assert!(h.email_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_email_channel_invokes_exactly_the_email_notifier() {
        let mut h = harness(enabled_config(Channel::Email), Ok(test_region()), false);

        let outcome = h.dispatcher.process(&occurrence("TypeError"), &ctx()).await;
        assert_eq!(outcome, DispatchOutcome::Dispatched);

        let payload = recv_payload(&mut h.email_rx).await;
        assert!(matches!(payload, RenderedPayload::Email(_)));
        assert!(h.chat_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_geo_lookup_abandons_the_attempt() {
        let mut h = harness(
            enabled_config(Channel::Chat),
            Err(GeoError::Lookup("connection refused".to_string())),
            false,
        );

        let outcome = h.dispatcher.process(&occurrence("TypeError"), &ctx()).await;

        assert_eq!(outcome, DispatchOutcome::EnrichmentFailed);
        assert!(h.chat_rx.try_recv().is_err());
        assert!(h.email_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delivery_failure_is_contained() {
        let mut h = harness(enabled_config(Channel::Chat), Ok(test_region()), true);

        // `handle` must return normally even though the transport errors.
        h.dispatcher.handle(&occurrence("TypeError"), &ctx()).await;

        let payload = recv_payload(&mut h.chat_rx).await;
        assert!(matches!(payload, RenderedPayload::Chat(_)));
    }

    #[tokio::test]
    async fn test_at_most_one_delivery_attempt_per_occurrence() {
        let mut h = harness(enabled_config(Channel::Chat), Ok(test_region()), true);

        h.dispatcher.handle(&occurrence("TypeError"), &ctx()).await;

        recv_payload(&mut h.chat_rx).await;
        // The transport failed, but no retry may follow.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.chat_rx.try_recv().is_err());
    }
}
