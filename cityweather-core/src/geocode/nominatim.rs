//! Nominatim / OpenStreetMap forward geocoder.
//!
//! The public instance allows at most one request per second and requires an
//! identifying User-Agent. See <https://nominatim.org/release-docs/develop/api/Search/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{error::ProviderError, geocode::GeocodingProvider, provider::truncate_body};

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = concat!("cityweather/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    display_name: Option<String>,
}

fn first_display_name(places: Vec<NominatimPlace>) -> Option<String> {
    places
        .into_iter()
        .next()
        .and_then(|p| p.display_name)
        .filter(|name| !name.trim().is_empty())
}

#[async_trait]
impl GeocodingProvider for NominatimGeocoder {
    async fn display_name(&self, city: &str) -> Result<Option<String>, ProviderError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)?;
        let name = first_display_name(places);
        debug!(city, display_name = ?name, "geocoded");
        Ok(name)
    }
}
