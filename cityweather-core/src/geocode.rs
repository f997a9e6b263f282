use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{Config, error::ProviderError, geocode::nominatim::NominatimGeocoder};

pub mod nominatim;

/// Forward geocoding by place name.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + Debug {
    /// Free-text descriptor of the best match (e.g. Nominatim's `display_name`),
    /// or `None` when nothing matched.
    async fn display_name(&self, city: &str) -> Result<Option<String>, ProviderError>;
}

pub fn geocoder_from_config(config: &Config) -> anyhow::Result<Arc<dyn GeocodingProvider>> {
    let geocoder = NominatimGeocoder::new(
        config.geocoding.base_url.clone(),
        &config.geocoding.user_agent,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(geocoder))
}
