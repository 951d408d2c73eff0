//! Configuration management for ExNotify
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to load configuration from an `exnotify.toml` file and merge it
//! with environment variables and command-line arguments.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::cli::Cli;

/// The main configuration struct for the application.
///
/// Loaded once at startup and read-only thereafter.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The application name shown in every notification.
    pub app_name: String,
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the notification dispatcher.
    pub notify: NotifyConfig,
    /// Configuration for the sending mail account.
    pub mail: MailConfig,
    /// Configuration for the IP geolocation lookup.
    pub geo: GeoConfig,
    /// Configuration for downstream delivery.
    pub delivery: DeliveryConfig,
}

/// The notification channel an occurrence is dispatched to.
///
/// Selection is exclusive; `None` is an explicit "do nothing" arm rather
/// than a silent fall-through.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    None,
    Chat,
    Email,
}

/// Configuration for the notification dispatcher.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    /// Master switch; when false no occurrence is ever notified.
    pub enabled: bool,
    /// The single channel notifications are dispatched to.
    pub channel: Channel,
    /// Error type names that are deliberately never notified.
    pub suppressed_errors: HashSet<String>,
    /// Chat target settings.
    pub chat: ChatTargetConfig,
    /// Email target settings.
    pub email: EmailTargetConfig,
}

/// Target settings for the chat-bot channel.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ChatTargetConfig {
    /// The bot webhook URL template messages are posted to.
    pub webhook_url: String,
    /// The recipient id the template is delivered to.
    pub recipient: String,
    /// The template id registered with the bot platform.
    pub template_id: String,
}

/// Target settings for the email channel.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EmailTargetConfig {
    /// The mail gateway URL messages are submitted to.
    pub gateway_url: String,
    /// The address notifications are sent to.
    pub to: String,
}

/// Settings for the sending mail account.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MailConfig {
    /// The account notifications are sent from (shown in the "From" display).
    pub account: String,
}

/// Settings for the IP geolocation lookup.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeoConfig {
    /// The lookup endpoint. When unset, region fields render as "unknown".
    pub endpoint: Option<String>,
    /// Per-lookup timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Settings for downstream delivery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DeliveryConfig {
    /// Upper bound on a single delivery attempt, in seconds. A hung
    /// transport is abandoned after this long instead of leaking the task.
    pub timeout_secs: u64,
}

impl Config {
    /// Loads the application configuration by layering sources: defaults,
    /// file, environment, and CLI args.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| "exnotify.toml".into());
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // Allow overriding with environment variables, e.g., EXNOTIFY_LOG_LEVEL=debug
            .merge(Env::prefixed("EXNOTIFY_"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "exnotify".to_string(),
            log_level: "info".to_string(),
            notify: NotifyConfig {
                enabled: false,
                channel: Channel::None,
                suppressed_errors: ["AppFlowException", "ValidationException"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                chat: ChatTargetConfig::default(),
                email: EmailTargetConfig::default(),
            },
            mail: MailConfig::default(),
            geo: GeoConfig {
                endpoint: None,
                timeout_ms: 2_000,
            },
            delivery: DeliveryConfig { timeout_secs: 10 },
        }
    }
}
