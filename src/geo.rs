//! IP geolocation lookup services.
//!
//! This module provides the `GeoResolver` implementations used to enrich an
//! occurrence with region data before rendering.

use crate::config::GeoConfig;
use crate::core::{GeoRegion, GeoResolver};
use anyhow::Result;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone)]
pub enum GeoError {
    #[error("geolocation lookup failed: {0}")]
    Lookup(String),

    #[error("geolocation service returned status {0}")]
    Status(u16),
}

/// A `GeoResolver` backed by an HTTP lookup service.
///
/// The service is expected to answer `GET <endpoint>?ip=<ip>` with a JSON
/// body of the shape `{ "region": .., "province": .., "city": .., "isp": .. }`.
pub struct HttpGeoResolver {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpGeoResolver {
    /// Creates a new resolver with a bounded per-lookup timeout.
    pub fn new(endpoint: String, timeout_ms: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl GeoResolver for HttpGeoResolver {
    async fn resolve(&self, ip: IpAddr) -> Result<GeoRegion, GeoError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("ip", ip.to_string())])
            .send()
            .await
            .map_err(|e| GeoError::Lookup(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let region: GeoRegion = response
            .json()
            .await
            .map_err(|e| GeoError::Lookup(e.to_string()))?;
        debug!(%ip, region = %region.formatted(), "resolved source ip");
        Ok(region)
    }
}

/// A `GeoResolver` for deployments without a lookup service.
///
/// Every field of the returned region reads "unknown"; notification still
/// goes out with a complete payload.
#[derive(Debug, Clone)]
pub struct NoOpGeoResolver;

#[async_trait]
impl GeoResolver for NoOpGeoResolver {
    async fn resolve(&self, _ip: IpAddr) -> Result<GeoRegion, GeoError> {
        Ok(GeoRegion::unknown())
    }
}

/// Builds the resolver selected by the configuration.
pub fn from_config(config: &GeoConfig) -> Result<Arc<dyn GeoResolver>> {
    match &config.endpoint {
        Some(endpoint) => {
            info!(%endpoint, "geolocation lookup enabled");
            Ok(Arc::new(HttpGeoResolver::new(
                endpoint.clone(),
                config.timeout_ms,
            )?))
        }
        None => {
            info!("no geolocation endpoint configured, region fields will be unknown");
            Ok(Arc::new(NoOpGeoResolver))
        }
    }
}
