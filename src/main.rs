//! ExNotify - exception notification dispatcher
//!
//! The binary exists to validate a deployment's notification setup: it loads
//! the layered configuration, wires up the real collaborators and, with
//! `--probe`, pushes a synthetic exception through the full pipeline so an
//! operator can confirm the channel works end to end.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use exnotify::{
    cli::Cli,
    config::Config,
    core::{ErrorOccurrence, RequestContext},
    dispatcher::Dispatcher,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        eprintln!("Failed to load configuration: {err:#}");
        // Exit if configuration fails, as it's a critical step.
        std::process::exit(1);
    });

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("ExNotify starting up...");

    // Log the loaded configuration settings for visibility
    info!("-------------------- Configuration --------------------");
    info!("App Name: {}", config.app_name);
    info!("Log Level: {}", config.log_level);
    info!("Notifications Enabled: {}", config.notify.enabled);
    info!("Channel: {:?}", config.notify.channel);
    info!(
        "Suppressed Errors: {}",
        config
            .notify
            .suppressed_errors
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "Geo Endpoint: {}",
        config.geo.endpoint.as_deref().unwrap_or("Not configured")
    );
    info!("Geo Timeout: {}ms", config.geo.timeout_ms);
    info!("Delivery Timeout: {}s", config.delivery.timeout_secs);
    info!("-------------------------------------------------------");

    let config = Arc::new(config);
    let dispatcher = Dispatcher::from_config(Arc::clone(&config))?;

    if cli.probe {
        info!("Dispatching synthetic probe exception...");
        let error = ErrorOccurrence::new(
            "ProbeException",
            "synthetic probe raised by the exnotify CLI",
            "ProbeException: synthetic probe\n    at exnotify::main",
        );
        let ctx = RequestContext {
            source_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            url: "exnotify://probe".to_string(),
            timestamp: Utc::now(),
        };
        dispatcher.handle(&error, &ctx).await;

        // Delivery runs detached from the caller; give it until the
        // configured timeout before the process exits.
        tokio::time::sleep(
            Duration::from_secs(config.delivery.timeout_secs) + Duration::from_millis(500),
        )
        .await;
        info!("Probe dispatched.");
    } else {
        info!("Configuration loaded. Run with --probe to send a test notification.");
    }

    Ok(())
}
