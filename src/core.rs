//! Core domain types and service traits for ExNotify
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::geo::GeoError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A single raised application error being considered for notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOccurrence {
    /// The error type name (e.g., "TypeError")
    pub name: String,
    /// Human-readable error message
    pub message: String,
    /// Full stack trace captured at the failure site
    pub stack_trace: String,
}

impl ErrorOccurrence {
    /// Creates a new occurrence from the pieces captured at the failure site.
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        stack_trace: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack_trace: stack_trace.into(),
        }
    }
}

/// Request-scoped context supplied by the caller alongside an occurrence.
///
/// Read-only to the dispatcher; it is only ever used to fill in the rendered
/// payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// The client IP the failing request originated from
    pub source_ip: IpAddr,
    /// The full URL of the failing request
    pub url: String,
    /// When the occurrence was raised
    pub timestamp: DateTime<Utc>,
}

/// Geolocation data for a source IP, discarded after rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GeoRegion {
    pub region: String,
    pub province: String,
    pub city: String,
    pub isp: String,
}

impl GeoRegion {
    /// Renders the region as a single display string.
    pub fn formatted(&self) -> String {
        format!(
            "{} - {}{} - {}",
            self.region, self.province, self.city, self.isp
        )
    }

    /// A placeholder region for deployments without a lookup service.
    pub fn unknown() -> Self {
        Self {
            region: "unknown".to_string(),
            province: "unknown".to_string(),
            city: "unknown".to_string(),
            isp: "unknown".to_string(),
        }
    }
}

/// A single display-colored entry of a chat template message.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChatField {
    pub value: String,
    pub color: String,
}

/// A fully rendered chat template message, addressing included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// The recipient id the bot delivers the template to
    pub recipient: String,
    /// The template id registered with the bot platform
    pub template_id: String,
    /// Ordered key/value entries filling the template slots
    pub fields: Vec<(String, ChatField)>,
}

/// A fully rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// The channel-specific payload produced for exactly one occurrence.
///
/// Built fresh per occurrence, never cached or reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedPayload {
    Chat(ChatMessage),
    Email(EmailMessage),
}

// =============================================================================
// Service Traits
// =============================================================================

/// Resolves a source IP to its geographic region
#[async_trait]
pub trait GeoResolver: Send + Sync {
    /// Looks up the region, province, city and ISP for an IP address
    ///
    /// # Arguments
    /// * `ip` - The IP address to look up
    ///
    /// # Returns
    /// * `Ok(GeoRegion)` on a successful lookup
    /// * `Err` for lookup errors including timeouts and malformed responses
    async fn resolve(&self, ip: IpAddr) -> Result<GeoRegion, GeoError>;
}

/// Delivers a rendered payload to a notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// A unique, descriptive name for the channel (e.g., "chat", "email").
    /// Used for logging and metrics.
    fn name(&self) -> &str;

    /// Sends a payload to the downstream transport
    ///
    /// At most one attempt is made per occurrence; duplicate calls send
    /// duplicate messages.
    ///
    /// # Returns
    /// * `Ok(())` if the transport accepted the payload
    /// * `Err` if delivery failed (network error, rejected payload, etc.)
    async fn send(&self, payload: RenderedPayload) -> Result<()>;
}
